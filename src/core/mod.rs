mod engine;
mod types;
mod workbook;

pub use engine::{
    HIGH_BRACKET_RATE, LOW_BRACKET_RATE, aggregate, compute_row, employment_deduction,
    parse_amount,
};
pub use types::{Constants, DerivedRow, HealthStatus, IncomeType, IsaStatus, RowInputs, Totals};
pub use workbook::{Row, RowEdit, Workbook};
