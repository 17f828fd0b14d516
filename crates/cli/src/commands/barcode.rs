//! Offline EAN-13 checks for warehouse staff without back-office access.

use momtazchem_core::Ean13;

use super::CommandError;

/// Validate a code and log its GS1 fields.
///
/// # Errors
///
/// Returns `CommandError::Barcode` describing why the code is invalid.
pub fn validate(code: &str) -> Result<(), CommandError> {
    let ean = Ean13::parse(code)?;
    let parts = ean.components();

    tracing::info!("{ean} is a valid EAN-13");
    tracing::info!("  Country prefix: {}", parts.country_prefix);
    tracing::info!("  Company code:   {}", parts.company_code);
    tracing::info!("  Product code:   {}", parts.product_code);
    tracing::info!("  Check digit:    {}", parts.check_digit);
    if !ean.is_company_code() {
        tracing::warn!("Not a Momtazchem company barcode");
    }
    Ok(())
}

/// Build and log the company barcode for `product_code`.
///
/// # Errors
///
/// Returns `CommandError::Barcode` if the product code has more than four
/// digits.
pub fn generate(product_code: u16) -> Result<Ean13, CommandError> {
    let ean = Ean13::for_product(product_code)?;
    tracing::info!("{ean}");
    Ok(ean)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_code_validates() {
        let ean = generate(1234).unwrap();
        assert!(validate(&ean.as_str()).is_ok());
    }

    #[test]
    fn test_product_code_too_large() {
        assert!(matches!(generate(10_000), Err(CommandError::Barcode(_))));
    }

    #[test]
    fn test_bad_check_digit_is_reported() {
        let mut code = generate(42).unwrap().as_str();
        let last = code.pop().unwrap();
        code.push(if last == '0' { '1' } else { '0' });
        assert!(matches!(validate(&code), Err(CommandError::Barcode(_))));
    }
}
