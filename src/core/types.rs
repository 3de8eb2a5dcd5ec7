use serde::Serialize;

/// Health-insurance / tax classification of one person.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IncomeType {
    SimplifiedBusiness,
    Dependent,
    EmployedInsured,
}

/// Session-wide rate and threshold table, fixed at startup.
///
/// All amounts are in won; all rates are fractions (not percent).
#[derive(Debug, Clone, Copy)]
pub struct Constants {
    pub expense_rate: f64,
    pub health_rate: f64,
    pub isa_limit: f64,
    pub employer_health_limit: f64,
    pub dependent_limit: f64,
    pub tax_safe_limit: f64,
    pub withholding_rate: f64,
}

impl Default for Constants {
    fn default() -> Self {
        Self {
            expense_rate: 0.641,
            health_rate: 0.0709,
            isa_limit: 38_000_000.0,
            employer_health_limit: 20_000_000.0,
            dependent_limit: 5_000_000.0,
            tax_safe_limit: 24_000_000.0,
            withholding_rate: 0.033,
        }
    }
}

/// Editable inputs of one row. Amounts are non-negative won.
#[derive(Debug, Clone, Copy)]
pub struct RowInputs {
    pub income_type: IncomeType,
    pub existing_income: f64,
    pub business_income: f64,
    pub additional_amount: f64,
}

impl Default for RowInputs {
    fn default() -> Self {
        Self {
            income_type: IncomeType::SimplifiedBusiness,
            existing_income: 0.0,
            business_income: 0.0,
            additional_amount: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum IsaStatus {
    Safe { margin: f64 },
    Exceeded { overage: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum HealthStatus {
    Safe {
        margin: f64,
    },
    /// Premium rises. Employer-insured rows report the threshold overage;
    /// simplified-business rows are a projection with no overage to report.
    Increase {
        overage: Option<f64>,
    },
    /// Dependent coverage lost; must convert to regional insurance.
    Disqualified,
}

/// Everything derived from one row's inputs. Pure function of
/// `RowInputs` + `Constants`; never edited directly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedRow {
    pub adjusted_business_income: f64,
    pub combined_income: f64,
    pub isa: IsaStatus,
    pub health: HealthStatus,
    pub monthly_health_insurance: f64,
    pub annual_health_insurance: f64,
    pub tax_bracket_rate: f64,
    pub incremental_tax: f64,
    pub net_income: f64,
}

/// Workbook-level sums, recomputed from scratch over all rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub additional_amount: f64,
    pub business_income: f64,
    pub adjusted_business_income: f64,
    pub combined_income: f64,
    pub annual_health_insurance: f64,
    pub incremental_tax: f64,
    pub net_income: f64,
}
