use crate::domain::hold::HoldId;
use crate::domain::ports::{PaymentGateway, PaymentOutcome, PaymentToken};
use crate::error::{BookingError, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;

/// Simulated gateway whose answer is driven by the token itself.
///
/// * `decline...` is declined
/// * `error...` fails as if the gateway were unreachable
/// * `slow:<millis>...` answers after the given delay
/// * anything else is authorized
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenPaymentGateway;

impl TokenPaymentGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PaymentGateway for TokenPaymentGateway {
    async fn authorize(
        &self,
        hold: HoldId,
        token: &PaymentToken,
        amount: Decimal,
    ) -> Result<PaymentOutcome> {
        let mut token = token.0.as_str();

        if let Some(rest) = token.strip_prefix("slow:") {
            let (millis, remainder) = rest.split_once(':').unwrap_or((rest, ""));
            let millis = millis.parse::<u64>().map_err(|_| {
                BookingError::ValidationError(format!("Invalid delay in payment token: {rest}"))
            })?;
            tokio::time::sleep(Duration::from_millis(millis)).await;
            token = remainder;
        }

        if token.starts_with("decline") {
            return Ok(PaymentOutcome::Declined {
                reason: format!("card declined for {amount}"),
            });
        }
        if token.starts_with("error") {
            return Err(BookingError::PaymentFailed(
                "payment gateway unreachable".to_string(),
            ));
        }

        Ok(PaymentOutcome::Authorized {
            reference: format!("auth-{hold}"),
        })
    }
}
