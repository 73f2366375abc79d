//! Currency conversion via exchangerate-api.com

use super::{Tool, ToolContext, ToolOutput};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

const EXCHANGE_URL: &str = "https://v6.exchangerate-api.com/v6";

pub struct CurrencyConverterTool;

#[derive(Debug, Deserialize)]
struct ConvertInput {
    amount: f64,
    from_currency: String,
    to_currency: String,
}

#[derive(Debug, Deserialize)]
struct PairResponse {
    result: String,
    conversion_result: Option<f64>,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
}

fn summarize(input: &ConvertInput, response: &PairResponse) -> Result<String, String> {
    match (response.result.as_str(), response.conversion_result) {
        ("success", Some(converted)) => Ok(format!(
            "{} {} is approximately {converted:.2} {}",
            input.amount, input.from_currency, input.to_currency
        )),
        _ => Err(format!(
            "Currency conversion failed: {}",
            response.error_type.as_deref().unwrap_or("Unknown error")
        )),
    }
}

#[async_trait]
impl Tool for CurrencyConverterTool {
    fn name(&self) -> &'static str {
        "currency_converter"
    }

    fn description(&self) -> String {
        "Convert an amount between currencies using live exchange rates.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["amount", "from_currency", "to_currency"],
            "properties": {
                "amount": {"type": "number"},
                "from_currency": {"type": "string", "description": "ISO code, e.g. EUR"},
                "to_currency": {"type": "string", "description": "ISO code, e.g. INR"}
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutput {
        let input: ConvertInput = match serde_json::from_value(input) {
            Ok(i) => i,
            Err(e) => return ToolOutput::error(format!("Invalid input: {e}")),
        };
        let Some(api_key) = ctx.config().exchange_rates_api_key.as_deref() else {
            return ToolOutput::error("EXCHANGE_RATES_API_KEY is not set");
        };

        let url = format!(
            "{EXCHANGE_URL}/{api_key}/pair/{}/{}/{}",
            input.from_currency.trim().to_uppercase(),
            input.to_currency.trim().to_uppercase(),
            input.amount
        );
        let response = ctx
            .http()
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        let body = match response {
            Ok(r) => r.json::<PairResponse>().await,
            Err(e) => return ToolOutput::error(format!("Currency conversion error: {e}")),
        };

        match body.map_err(|e| e.to_string()).and_then(|b| summarize(&input, &b)) {
            Ok(text) => ToolOutput::success(text),
            Err(e) => ToolOutput::error(e),
        }
    }
}
