//! VietQR payment payload encoder.
//!
//! Builds the EMVCo merchant-presented QR string used by Vietnamese banking
//! apps for a NAPAS 247 account transfer. Rendering the string as an image is
//! left to whoever displays it.
//!
//! Every field is a TLV triple: a two-digit tag, a two-digit decimal length,
//! then the value. The payload ends with a CRC16/CCITT-FALSE checksum over
//! everything before it, including the checksum's own tag and length.

/// NAPAS global unique identifier for VietQR.
const NAPAS_GUID: &str = "A000000727";
/// Service code for a transfer to an account number.
const SERVICE_ACCOUNT_TRANSFER: &str = "QRIBFTTA";
/// ISO 4217 numeric code for VND.
const CURRENCY_VND: &str = "704";
const COUNTRY_VN: &str = "VN";

mod tag {
    pub const PAYLOAD_FORMAT: &str = "00";
    pub const INITIATION_METHOD: &str = "01";
    pub const MERCHANT_INFO: &str = "38";
    pub const CURRENCY: &str = "53";
    pub const AMOUNT: &str = "54";
    pub const COUNTRY: &str = "58";
    pub const ADDITIONAL_DATA: &str = "62";
    pub const CRC: &str = "63";

    // Sub-tags of MERCHANT_INFO
    pub const GUID: &str = "00";
    pub const BENEFICIARY: &str = "01";
    pub const SERVICE: &str = "02";

    // Sub-tags of BENEFICIARY
    pub const BANK_BIN: &str = "00";
    pub const ACCOUNT: &str = "01";

    // Sub-tag of ADDITIONAL_DATA
    pub const PURPOSE: &str = "08";
}

/// Encode one TLV field. The length is the value's character count.
///
/// The length field is two digits wide, so values must stay under 100
/// characters. Bank bins, account numbers and transfer notes all do.
fn field(tag: &str, value: &str) -> String {
    let len = value.chars().count();
    debug_assert!(len < 100, "TLV value for tag {} is {} characters", tag, len);
    format!("{}{:02}{}", tag, len, value)
}

/// Build the VietQR payload for a transfer of `amount` VND to `account` at
/// the bank identified by `bin`, carrying `note` as the transfer purpose.
///
/// Inputs are formatted, not validated.
///
/// ```rust
/// let payload = tollgate::vietqr::encode("970436", "0123456789", 2_000_000, "DISCORD_42");
/// assert!(payload.contains("54072000000"));
/// assert!(payload.contains("0810DISCORD_42"));
/// ```
#[must_use]
pub fn encode(bin: &str, account: &str, amount: u64, note: &str) -> String {
    let beneficiary = [field(tag::BANK_BIN, bin), field(tag::ACCOUNT, account)].concat();
    let merchant = [
        field(tag::GUID, NAPAS_GUID),
        field(tag::BENEFICIARY, &beneficiary),
        field(tag::SERVICE, SERVICE_ACCOUNT_TRANSFER),
    ]
    .concat();

    let mut payload = [
        field(tag::PAYLOAD_FORMAT, "01"),
        // 12 = dynamic QR, the amount is fixed by the payee
        field(tag::INITIATION_METHOD, "12"),
        field(tag::MERCHANT_INFO, &merchant),
        field(tag::CURRENCY, CURRENCY_VND),
        field(tag::AMOUNT, &amount.to_string()),
        field(tag::COUNTRY, COUNTRY_VN),
        field(tag::ADDITIONAL_DATA, &field(tag::PURPOSE, note)),
    ]
    .concat();

    payload.push_str(tag::CRC);
    payload.push_str("04");
    let crc = crc16_ccitt(payload.as_bytes());
    payload.push_str(&format!("{:04X}", crc));
    payload
}

/// CRC16/CCITT-FALSE: polynomial 0x1021, initial value 0xFFFF, no reflection.
fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}
