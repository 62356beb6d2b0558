use anyhow::Result;
use tollgate::lifecycle::messages::format_amount;
use tollgate::plans::PayCountry;
use tollgate::store::transfer_note;
use tollgate::vietqr;

use super::load_config;
use crate::cli::QrArgs;
use crate::print_info;

pub fn run(args: QrArgs) -> Result<()> {
    let config = load_config()?;
    let catalog = config.roles.catalog()?;
    let vn = &config.payment.vn;

    let amount = catalog.price(args.plan, PayCountry::Vietnam);
    let note = transfer_note(&args.user);

    print_info(&format!(
        "{} ({}) for {}: {} VND to {} {}",
        args.plan.label(),
        args.plan,
        args.user,
        format_amount(amount),
        vn.bank_name,
        vn.account_number
    ));
    println!("{}", vietqr::encode(&vn.bank_bin, &vn.account_number, amount, &note));
    Ok(())
}
