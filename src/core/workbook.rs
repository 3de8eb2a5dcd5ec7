use super::engine::{aggregate, compute_row};
use super::types::{Constants, DerivedRow, IncomeType, RowInputs, Totals};

/// One managed person: editable inputs plus their derived values.
#[derive(Debug, Clone)]
pub struct Row {
    pub id: u64,
    pub name: String,
    pub inputs: RowInputs,
    pub derived: DerivedRow,
}

/// Partial row data used for both seeding new rows and patching existing
/// ones. Absent fields default to zero / the first income type on add, and
/// leave the current value unchanged on update.
#[derive(Debug, Clone, Default)]
pub struct RowEdit {
    pub name: Option<String>,
    pub income_type: Option<IncomeType>,
    pub existing_income: Option<f64>,
    pub business_income: Option<f64>,
    pub additional_amount: Option<f64>,
}

/// Ordered collection of rows with the session constants. The single owner
/// of row state: every mutation goes through `add_row` / `update_row` /
/// `delete_row` / `reset`, and derived values are recomputed synchronously
/// before the call returns.
#[derive(Debug)]
pub struct Workbook {
    constants: Constants,
    rows: Vec<Row>,
    next_id: u64,
}

impl Workbook {
    pub fn new(constants: Constants) -> Self {
        Self {
            constants,
            rows: Vec::new(),
            next_id: 1,
        }
    }

    /// Workbook pre-populated with the bundled sample household.
    pub fn with_seed_rows(constants: Constants) -> Self {
        let mut workbook = Self::new(constants);
        let seeds = [
            ("상희", IncomeType::SimplifiedBusiness, 5_000_000.0, 0.0, 15_000_000.0),
            ("영지", IncomeType::Dependent, 10_000_000.0, 0.0, 3_900_000.0),
            ("진영", IncomeType::EmployedInsured, 42_000_000.0, 0.0, 19_500_000.0),
            ("와이프", IncomeType::EmployedInsured, 24_000_000.0, 0.0, 21_000_000.0),
        ];
        for (name, income_type, existing, biz, add) in seeds {
            workbook.add_row(RowEdit {
                name: Some(name.to_string()),
                income_type: Some(income_type),
                existing_income: Some(existing),
                business_income: Some(biz),
                additional_amount: Some(add),
            });
        }
        workbook
    }

    pub fn constants(&self) -> &Constants {
        &self.constants
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, id: u64) -> Option<&Row> {
        self.rows.iter().find(|row| row.id == id)
    }

    pub fn add_row(&mut self, edit: RowEdit) -> &Row {
        let inputs = RowInputs {
            income_type: edit.income_type.unwrap_or(IncomeType::SimplifiedBusiness),
            existing_income: edit.existing_income.unwrap_or(0.0),
            business_income: edit.business_income.unwrap_or(0.0),
            additional_amount: edit.additional_amount.unwrap_or(0.0),
        };
        let row = Row {
            id: self.next_id,
            name: edit.name.unwrap_or_default(),
            inputs,
            derived: compute_row(&inputs, &self.constants),
        };
        self.next_id += 1;
        self.rows.push(row);
        self.rows.last().expect("row just pushed")
    }

    /// Applies a partial edit and recomputes the row. Returns `None` when no
    /// row has the given id.
    pub fn update_row(&mut self, id: u64, edit: RowEdit) -> Option<&Row> {
        let constants = self.constants;
        let row = self.rows.iter_mut().find(|row| row.id == id)?;
        if let Some(name) = edit.name {
            row.name = name;
        }
        if let Some(income_type) = edit.income_type {
            row.inputs.income_type = income_type;
        }
        if let Some(existing) = edit.existing_income {
            row.inputs.existing_income = existing;
        }
        if let Some(biz) = edit.business_income {
            row.inputs.business_income = biz;
        }
        if let Some(add) = edit.additional_amount {
            row.inputs.additional_amount = add;
        }
        row.derived = compute_row(&row.inputs, &constants);
        Some(&*row)
    }

    /// Removes one row entirely; other rows are untouched. Returns whether a
    /// row was actually removed.
    pub fn delete_row(&mut self, id: u64) -> bool {
        let before = self.rows.len();
        self.rows.retain(|row| row.id != id);
        self.rows.len() != before
    }

    pub fn reset(&mut self) {
        self.rows.clear();
    }

    pub fn totals(&self) -> Totals {
        aggregate(self.rows.iter().map(|row| (&row.inputs, &row.derived)))
    }
}
