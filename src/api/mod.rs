use axum::{
    Router,
    extract::{Json, Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;

use crate::core::{
    Constants, DerivedRow, IncomeType, Row, RowEdit, Totals, Workbook, parse_amount,
};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
enum ApiIncomeType {
    #[serde(alias = "simplifiedBusiness", alias = "simplified_business", alias = "간이사업자")]
    SimplifiedBusiness,
    #[serde(alias = "피부양자")]
    Dependent,
    #[serde(alias = "employedInsured", alias = "employed_insured", alias = "4대보험")]
    EmployedInsured,
}

impl From<ApiIncomeType> for IncomeType {
    fn from(value: ApiIncomeType) -> Self {
        match value {
            ApiIncomeType::SimplifiedBusiness => IncomeType::SimplifiedBusiness,
            ApiIncomeType::Dependent => IncomeType::Dependent,
            ApiIncomeType::EmployedInsured => IncomeType::EmployedInsured,
        }
    }
}

impl From<IncomeType> for ApiIncomeType {
    fn from(value: IncomeType) -> Self {
        match value {
            IncomeType::SimplifiedBusiness => ApiIncomeType::SimplifiedBusiness,
            IncomeType::Dependent => ApiIncomeType::Dependent,
            IncomeType::EmployedInsured => ApiIncomeType::EmployedInsured,
        }
    }
}

/// Currency amount as sent by the client: either a JSON number or free text
/// ("15,000,000"). Both coerce to a non-negative amount; unparseable input
/// becomes 0, never an error.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum AmountField {
    Number(f64),
    Text(String),
}

impl AmountField {
    fn amount(&self) -> f64 {
        match self {
            AmountField::Number(value) if value.is_finite() && *value > 0.0 => *value,
            AmountField::Number(_) => 0.0,
            AmountField::Text(text) => parse_amount(text),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RowPayload {
    name: Option<String>,
    income_type: Option<ApiIncomeType>,
    existing_income: Option<AmountField>,
    business_income: Option<AmountField>,
    additional_amount: Option<AmountField>,
}

fn row_edit_from_payload(payload: RowPayload) -> RowEdit {
    RowEdit {
        name: payload.name,
        income_type: payload.income_type.map(IncomeType::from),
        existing_income: payload.existing_income.as_ref().map(AmountField::amount),
        business_income: payload.business_income.as_ref().map(AmountField::amount),
        additional_amount: payload.additional_amount.as_ref().map(AmountField::amount),
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "sidegig",
    about = "Freelancer side-income planner: per-person net income, incremental tax, and health insurance impact"
)]
struct Cli {
    #[arg(long, default_value_t = 8080)]
    port: u16,
    #[arg(
        long,
        default_value_t = 64.1,
        help = "Simplified expense ratio in percent"
    )]
    expense_rate: f64,
    #[arg(
        long,
        default_value_t = 7.09,
        help = "Health insurance premium rate in percent"
    )]
    health_rate: f64,
    #[arg(
        long,
        default_value_t = 38_000_000.0,
        help = "Combined income ceiling for the preferential ISA tier"
    )]
    isa_limit: f64,
    #[arg(
        long,
        default_value_t = 20_000_000.0,
        help = "Extra income threshold before employer-insured premiums rise"
    )]
    employer_health_limit: f64,
    #[arg(
        long,
        default_value_t = 5_000_000.0,
        help = "Business income ceiling for dependent coverage"
    )]
    dependent_limit: f64,
    #[arg(
        long,
        default_value_t = 24_000_000.0,
        help = "Combined income threshold for the higher tax bracket"
    )]
    tax_safe_limit: f64,
    #[arg(
        long,
        default_value_t = 3.3,
        help = "Withholding rate on additional income in percent"
    )]
    withholding_rate: f64,
    #[arg(
        long,
        help = "Start with an empty workbook instead of the bundled sample rows"
    )]
    empty: bool,
}

fn build_constants(cli: &Cli) -> Result<Constants, String> {
    if !(0.0..100.0).contains(&cli.expense_rate) {
        return Err("--expense-rate must be >= 0 and < 100".to_string());
    }

    for (name, rate) in [
        ("--health-rate", cli.health_rate),
        ("--withholding-rate", cli.withholding_rate),
    ] {
        if !(0.0..=100.0).contains(&rate) {
            return Err(format!("{name} must be between 0 and 100"));
        }
    }

    for (name, limit) in [
        ("--isa-limit", cli.isa_limit),
        ("--employer-health-limit", cli.employer_health_limit),
        ("--dependent-limit", cli.dependent_limit),
        ("--tax-safe-limit", cli.tax_safe_limit),
    ] {
        if !limit.is_finite() || limit < 0.0 {
            return Err(format!("{name} must be >= 0"));
        }
    }

    Ok(Constants {
        expense_rate: cli.expense_rate / 100.0,
        health_rate: cli.health_rate / 100.0,
        isa_limit: cli.isa_limit,
        employer_health_limit: cli.employer_health_limit,
        dependent_limit: cli.dependent_limit,
        tax_safe_limit: cli.tax_safe_limit,
        withholding_rate: cli.withholding_rate / 100.0,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConstantsResponse {
    expense_rate: f64,
    health_rate: f64,
    isa_limit: f64,
    employer_health_limit: f64,
    dependent_limit: f64,
    tax_safe_limit: f64,
    withholding_rate: f64,
}

impl From<&Constants> for ConstantsResponse {
    fn from(constants: &Constants) -> Self {
        Self {
            expense_rate: constants.expense_rate,
            health_rate: constants.health_rate,
            isa_limit: constants.isa_limit,
            employer_health_limit: constants.employer_health_limit,
            dependent_limit: constants.dependent_limit,
            tax_safe_limit: constants.tax_safe_limit,
            withholding_rate: constants.withholding_rate,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RowResponse {
    id: u64,
    name: String,
    income_type: ApiIncomeType,
    existing_income: f64,
    business_income: f64,
    additional_amount: f64,
    derived: DerivedRow,
}

impl From<&Row> for RowResponse {
    fn from(row: &Row) -> Self {
        Self {
            id: row.id,
            name: row.name.clone(),
            income_type: row.inputs.income_type.into(),
            existing_income: row.inputs.existing_income,
            business_income: row.inputs.business_income,
            additional_amount: row.inputs.additional_amount,
            derived: row.derived,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkbookResponse {
    rows: Vec<RowResponse>,
    totals: Totals,
    constants: ConstantsResponse,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_workbook_response(workbook: &Workbook) -> WorkbookResponse {
    WorkbookResponse {
        rows: workbook.rows().iter().map(RowResponse::from).collect(),
        totals: workbook.totals(),
        constants: workbook.constants().into(),
    }
}

type SharedWorkbook = Arc<Mutex<Workbook>>;

fn lock_workbook(state: &SharedWorkbook) -> MutexGuard<'_, Workbook> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub async fn run() -> Result<(), String> {
    let cli = Cli::parse();
    let constants = build_constants(&cli)?;
    let workbook = if cli.empty {
        Workbook::new(constants)
    } else {
        Workbook::with_seed_rows(constants)
    };
    run_http_server(workbook, cli.port)
        .await
        .map_err(|e| format!("server error: {e}"))
}

pub async fn run_http_server(workbook: Workbook, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let state: SharedWorkbook = Arc::new(Mutex::new(workbook));
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route("/api/workbook", get(workbook_handler))
        .route("/api/rows", post(add_row_handler))
        .route(
            "/api/rows/:id",
            put(update_row_handler).delete(delete_row_handler),
        )
        .route("/api/reset", post(reset_handler))
        .fallback(not_found_handler)
        .with_state(state);

    let listener = TcpListener::bind(addr).await?;
    println!("sidegig HTTP API listening on http://{addr}");
    println!("Local access: http://127.0.0.1:{port}/");

    axum::serve(listener, app).await
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn workbook_handler(State(state): State<SharedWorkbook>) -> Response {
    let workbook = lock_workbook(&state);
    json_response(StatusCode::OK, build_workbook_response(&workbook))
}

async fn add_row_handler(
    State(state): State<SharedWorkbook>,
    payload: Option<Json<RowPayload>>,
) -> Response {
    let payload = payload.map(|Json(payload)| payload).unwrap_or_default();
    let mut workbook = lock_workbook(&state);
    workbook.add_row(row_edit_from_payload(payload));
    json_response(StatusCode::OK, build_workbook_response(&workbook))
}

async fn update_row_handler(
    State(state): State<SharedWorkbook>,
    Path(id): Path<u64>,
    Json(payload): Json<RowPayload>,
) -> Response {
    let mut workbook = lock_workbook(&state);
    if workbook.update_row(id, row_edit_from_payload(payload)).is_none() {
        return error_response(StatusCode::NOT_FOUND, &format!("no row with id {id}"));
    }
    json_response(StatusCode::OK, build_workbook_response(&workbook))
}

async fn delete_row_handler(State(state): State<SharedWorkbook>, Path(id): Path<u64>) -> Response {
    let mut workbook = lock_workbook(&state);
    if !workbook.delete_row(id) {
        return error_response(StatusCode::NOT_FOUND, &format!("no row with id {id}"));
    }
    json_response(StatusCode::OK, build_workbook_response(&workbook))
}

async fn reset_handler(State(state): State<SharedWorkbook>) -> Response {
    let mut workbook = lock_workbook(&state);
    workbook.reset();
    json_response(StatusCode::OK, build_workbook_response(&workbook))
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn row_edit_from_json(json: &str) -> Result<RowEdit, String> {
    let payload = serde_json::from_str::<RowPayload>(json)
        .map_err(|e| format!("Invalid row JSON payload: {e}"))?;
    Ok(row_edit_from_payload(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        Cli {
            port: 8080,
            expense_rate: 64.1,
            health_rate: 7.09,
            isa_limit: 38_000_000.0,
            employer_health_limit: 20_000_000.0,
            dependent_limit: 5_000_000.0,
            tax_safe_limit: 24_000_000.0,
            withholding_rate: 3.3,
            empty: false,
        }
    }

    #[test]
    fn build_constants_converts_percent_flags_to_fractions() {
        let constants = build_constants(&sample_cli()).expect("valid constants");
        let defaults = Constants::default();

        assert_approx(constants.expense_rate, defaults.expense_rate);
        assert_approx(constants.health_rate, defaults.health_rate);
        assert_approx(constants.withholding_rate, defaults.withholding_rate);
        assert_approx(constants.isa_limit, defaults.isa_limit);
        assert_approx(constants.tax_safe_limit, defaults.tax_safe_limit);
    }

    #[test]
    fn build_constants_rejects_full_expense_rate() {
        let mut cli = sample_cli();
        cli.expense_rate = 100.0;
        let err = build_constants(&cli).expect_err("must reject 100% expense rate");
        assert!(err.contains("--expense-rate"));
    }

    #[test]
    fn build_constants_rejects_out_of_range_rates_and_limits() {
        let mut cli = sample_cli();
        cli.health_rate = 120.0;
        let err = build_constants(&cli).expect_err("must reject rate > 100");
        assert!(err.contains("--health-rate"));

        let mut cli = sample_cli();
        cli.dependent_limit = -1.0;
        let err = build_constants(&cli).expect_err("must reject negative limit");
        assert!(err.contains("--dependent-limit"));
    }

    #[test]
    fn row_edit_from_json_parses_web_keys() {
        let json = r#"{
          "name": "상희",
          "incomeType": "simplified-business",
          "existingIncome": 5000000,
          "businessIncome": 0,
          "additionalAmount": 15000000
        }"#;
        let edit = row_edit_from_json(json).expect("json should parse");

        assert_eq!(edit.name.as_deref(), Some("상희"));
        assert_eq!(edit.income_type, Some(IncomeType::SimplifiedBusiness));
        assert_approx(edit.existing_income.expect("present"), 5_000_000.0);
        assert_approx(edit.business_income.expect("present"), 0.0);
        assert_approx(edit.additional_amount.expect("present"), 15_000_000.0);
    }

    #[test]
    fn row_edit_from_json_accepts_korean_income_type_labels() {
        for (label, expected) in [
            ("간이사업자", IncomeType::SimplifiedBusiness),
            ("피부양자", IncomeType::Dependent),
            ("4대보험", IncomeType::EmployedInsured),
        ] {
            let json = format!(r#"{{"incomeType": "{label}"}}"#);
            let edit = row_edit_from_json(&json).expect("label should parse");
            assert_eq!(edit.income_type, Some(expected));
        }
    }

    #[test]
    fn row_edit_from_json_coerces_text_amounts() {
        let json = r#"{
          "existingIncome": "42,000,000",
          "businessIncome": "abc",
          "additionalAmount": -5
        }"#;
        let edit = row_edit_from_json(json).expect("json should parse");

        assert_approx(edit.existing_income.expect("present"), 42_000_000.0);
        assert_approx(edit.business_income.expect("present"), 0.0);
        assert_approx(edit.additional_amount.expect("present"), 0.0);
    }

    #[test]
    fn row_edit_from_json_leaves_absent_fields_unset() {
        let edit = row_edit_from_json(r#"{"name": "영지"}"#).expect("json should parse");
        assert!(edit.income_type.is_none());
        assert!(edit.existing_income.is_none());
        assert!(edit.business_income.is_none());
        assert!(edit.additional_amount.is_none());
    }

    #[test]
    fn workbook_response_serialization_contains_expected_fields() {
        let workbook = Workbook::with_seed_rows(Constants::default());
        let response = build_workbook_response(&workbook);
        let json = serde_json::to_string(&response).expect("response should serialize");

        assert!(json.contains("\"rows\""));
        assert!(json.contains("\"totals\""));
        assert!(json.contains("\"constants\""));
        assert!(json.contains("\"incomeType\":\"simplified-business\""));
        assert!(json.contains("\"adjustedBusinessIncome\""));
        assert!(json.contains("\"combinedIncome\""));
        assert!(json.contains("\"monthlyHealthInsurance\""));
        assert!(json.contains("\"annualHealthInsurance\""));
        assert!(json.contains("\"incrementalTax\""));
        assert!(json.contains("\"netIncome\""));
        assert!(json.contains("\"status\":\"safe\""));
        assert!(json.contains("\"status\":\"increase\""));
        assert!(json.contains("\"margin\""));
    }

    #[test]
    fn health_status_serializes_with_status_tag() {
        let workbook = Workbook::with_seed_rows(Constants::default());
        // 상희 is simplified-business: projected increase with no overage.
        let response = build_workbook_response(&workbook);
        let json =
            serde_json::to_string(&response.rows[0].derived.health).expect("serializable");
        assert_eq!(json, r#"{"status":"increase","overage":null}"#);
    }

    #[test]
    fn mutations_through_the_workbook_keep_totals_in_step() {
        let mut workbook = Workbook::new(Constants::default());
        let id = workbook
            .add_row(row_edit_from_json(r#"{"additionalAmount": "10,000,000"}"#).expect("parses"))
            .id;
        let totals = workbook.totals();
        assert_approx(totals.additional_amount, 10_000_000.0);

        workbook
            .update_row(
                id,
                row_edit_from_json(r#"{"additionalAmount": 0}"#).expect("parses"),
            )
            .expect("row exists");
        assert_approx(workbook.totals().additional_amount, 0.0);
    }
}
