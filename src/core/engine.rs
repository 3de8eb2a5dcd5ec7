use super::types::{Constants, DerivedRow, HealthStatus, IncomeType, IsaStatus, RowInputs, Totals};

/// Bracket applied while combined income stays at or under the safe limit.
pub const LOW_BRACKET_RATE: f64 = 0.15;
/// Bracket applied once combined income strictly exceeds the safe limit.
pub const HIGH_BRACKET_RATE: f64 = 0.24;

/// Statutory employment-income deduction: four-tier progressive schedule
/// keyed on salary expressed in 10,000-won units. Piecewise linear,
/// continuous at the 500/1500/4500 tier boundaries, monotone non-decreasing.
pub fn employment_deduction(salary: f64) -> f64 {
    let s = salary / 10_000.0;
    if s <= 500.0 {
        salary * 0.7
    } else if s <= 1_500.0 {
        3_500_000.0 + (salary - 5_000_000.0) * 0.4
    } else if s <= 4_500.0 {
        7_500_000.0 + (salary - 15_000_000.0) * 0.15
    } else {
        12_000_000.0 + (salary - 45_000_000.0) * 0.05
    }
}

/// Coerces free-text currency input to a non-negative whole amount.
///
/// Keeps ASCII digits only ("1,500,000원" -> 1500000); anything without a
/// parseable digit sequence coerces to 0. This is the single place where
/// unparseable user input is silently normalized.
pub fn parse_amount(text: &str) -> f64 {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse::<u64>().map(|v| v as f64).unwrap_or(0.0)
}

/// Derives every displayed and aggregated quantity for one row.
///
/// Pure and total: no I/O, no hidden state, defined for all finite inputs.
pub fn compute_row(inputs: &RowInputs, constants: &Constants) -> DerivedRow {
    // Additional income is taxed after the simplified expense deduction.
    let adjusted_additional = inputs.additional_amount * (1.0 - constants.expense_rate);

    // For dependents the existing income is itself business income and gets
    // the same expense deduction.
    let mut adjusted_business_income = inputs.business_income + adjusted_additional;
    if inputs.income_type == IncomeType::Dependent {
        adjusted_business_income += inputs.existing_income * (1.0 - constants.expense_rate);
    }

    // Employed-insured existing income is salary, reduced by the statutory
    // deduction before combining; other types add it raw.
    let combined_income = match inputs.income_type {
        IncomeType::EmployedInsured => {
            (inputs.existing_income - employment_deduction(inputs.existing_income))
                + adjusted_business_income
        }
        IncomeType::SimplifiedBusiness | IncomeType::Dependent => {
            inputs.existing_income + adjusted_business_income
        }
    };

    // Equality stays on the safe side.
    let isa = if combined_income <= constants.isa_limit {
        IsaStatus::Safe {
            margin: constants.isa_limit - combined_income,
        }
    } else {
        IsaStatus::Exceeded {
            overage: combined_income - constants.isa_limit,
        }
    };

    let (health, monthly_health_insurance) = match inputs.income_type {
        IncomeType::EmployedInsured => {
            let extra = inputs.business_income + inputs.additional_amount;
            if extra > constants.employer_health_limit {
                let overage = extra - constants.employer_health_limit;
                (
                    HealthStatus::Increase {
                        overage: Some(overage),
                    },
                    overage * constants.health_rate / 12.0,
                )
            } else {
                (
                    HealthStatus::Safe {
                        margin: constants.employer_health_limit - extra,
                    },
                    0.0,
                )
            }
        }
        IncomeType::Dependent => {
            if adjusted_business_income > constants.dependent_limit {
                (HealthStatus::Disqualified, 0.0)
            } else {
                (
                    HealthStatus::Safe {
                        margin: constants.dependent_limit - adjusted_business_income,
                    },
                    0.0,
                )
            }
        }
        // Conservative projection for regional insurance: the premium tracks
        // assessed income, so there is no safe branch for this type.
        IncomeType::SimplifiedBusiness => (
            HealthStatus::Increase { overage: None },
            adjusted_business_income * constants.health_rate / 12.0,
        ),
    };
    let annual_health_insurance = monthly_health_insurance * 12.0;

    // Bracket flips only when combined income is strictly greater.
    let tax_bracket_rate = if combined_income > constants.tax_safe_limit {
        HIGH_BRACKET_RATE
    } else {
        LOW_BRACKET_RATE
    };
    // Tax owed on the deduction-adjusted additional income, net of the tax
    // already withheld at source on the raw amount. Negative means a refund.
    let incremental_tax = adjusted_additional * tax_bracket_rate
        - inputs.additional_amount * constants.withholding_rate;

    let net_income = inputs.business_income + inputs.additional_amount
        - annual_health_insurance
        - incremental_tax;

    DerivedRow {
        adjusted_business_income,
        combined_income,
        isa,
        health,
        monthly_health_insurance,
        annual_health_insurance,
        tax_bracket_rate,
        incremental_tax,
        net_income,
    }
}

/// Sums the retained per-row quantities into workbook totals.
///
/// Always a full pass over the given rows; an empty iterator yields all
/// zeros.
pub fn aggregate<'a, I>(rows: I) -> Totals
where
    I: IntoIterator<Item = (&'a RowInputs, &'a DerivedRow)>,
{
    let mut totals = Totals::default();
    for (inputs, derived) in rows {
        totals.additional_amount += inputs.additional_amount;
        totals.business_income += inputs.business_income;
        totals.adjusted_business_income += derived.adjusted_business_income;
        totals.combined_income += derived.combined_income;
        totals.annual_health_insurance += derived.annual_health_insurance;
        totals.incremental_tax += derived.incremental_tax;
        totals.net_income += derived.net_income;
    }
    totals
}
