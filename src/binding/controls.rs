//! Primitive controls mirrored by a control group.
//!
//! These hold display state only. Nothing here touches a `Parameter`; pushes
//! happen in `ControlGroup::handle`.

/// Editable numeric field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericField {
    value: f64,
    disabled: bool,
}

impl NumericField {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            disabled: false,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }
}

/// Checkbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Toggle {
    checked: bool,
}

impl Toggle {
    pub fn new(checked: bool) -> Self {
        Self { checked }
    }

    pub fn is_checked(&self) -> bool {
        self.checked
    }

    pub fn set_checked(&mut self, checked: bool) {
        self.checked = checked;
    }
}

/// Control value for a lower bound: the bound itself, or `-inf` when unbounded.
pub fn lower_to_control(bound: Option<f64>) -> f64 {
    bound.unwrap_or(f64::NEG_INFINITY)
}

/// Control value for an upper bound: the bound itself, or `+inf` when unbounded.
pub fn upper_to_control(bound: Option<f64>) -> f64 {
    bound.unwrap_or(f64::INFINITY)
}

/// Inverse of [`lower_to_control`]; `-inf` and NaN mean unbounded.
pub fn lower_from_control(value: f64) -> Option<f64> {
    (!value.is_nan() && value != f64::NEG_INFINITY).then_some(value)
}

/// Inverse of [`upper_to_control`]; `+inf` and NaN mean unbounded.
pub fn upper_from_control(value: f64) -> Option<f64> {
    (!value.is_nan() && value != f64::INFINITY).then_some(value)
}
