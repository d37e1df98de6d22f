//! Sets of fault categories to instrument.
use super::error::{CheckifyError, ErrorCategory};
use bitflags::bitflags;
use std::str::FromStr;

bitflags! {
    /// Fault categories selected for instrumentation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CheckSet: u8 {
        /// Failed `check` assertions. Always instrumented.
        const USER  = 0x01;
        /// NaN or infinity produced from finite operands.
        const NAN   = 0x02;
        /// Division by zero.
        const DIV   = 0x04;
        /// Out-of-bounds gather indices.
        const INDEX = 0x08;
    }
}

pub const USER_CHECKS: CheckSet = CheckSet::USER;
pub const NAN_CHECKS: CheckSet = CheckSet::NAN;
pub const FLOAT_CHECKS: CheckSet = CheckSet::NAN;
pub const DIV_CHECKS: CheckSet = CheckSet::DIV;
pub const INDEX_CHECKS: CheckSet = CheckSet::INDEX;

pub const AUTOMATIC_CHECKS: CheckSet = CheckSet::from_bits_truncate(
    CheckSet::NAN.bits() | CheckSet::DIV.bits() | CheckSet::INDEX.bits(),
);

pub const ALL_CHECKS: CheckSet =
    CheckSet::from_bits_truncate(AUTOMATIC_CHECKS.bits() | CheckSet::USER.bits());

impl CheckSet {
    /// Whether faults of `category` are reported. User checks are always on.
    pub fn enables(&self, category: ErrorCategory) -> bool {
        match category {
            ErrorCategory::UserCheck => true,
            ErrorCategory::NonFinite => self.contains(CheckSet::NAN),
            ErrorCategory::DivisionByZero => self.contains(CheckSet::DIV),
            ErrorCategory::OutOfBounds => self.contains(CheckSet::INDEX),
        }
    }
}

impl Default for CheckSet {
    fn default() -> Self {
        AUTOMATIC_CHECKS
    }
}

impl FromStr for CheckSet {
    type Err = CheckifyError;

    /// Parse a comma-separated list of preset names, e.g. `"div,index"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut checks = CheckSet::empty();
        for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            checks |= match name {
                "all" => ALL_CHECKS,
                "automatic" => AUTOMATIC_CHECKS,
                "user" => USER_CHECKS,
                "float" => FLOAT_CHECKS,
                "nan" => NAN_CHECKS,
                "div" => DIV_CHECKS,
                "index" => INDEX_CHECKS,
                _ => return Err(CheckifyError::UnknownCheck(name.to_string())),
            };
        }
        Ok(checks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(AUTOMATIC_CHECKS, CheckSet::NAN | CheckSet::DIV | CheckSet::INDEX);
        assert_eq!(ALL_CHECKS, CheckSet::all());
        assert!(!AUTOMATIC_CHECKS.contains(CheckSet::USER));
        assert_eq!(FLOAT_CHECKS, NAN_CHECKS);
        assert_eq!(CheckSet::default(), AUTOMATIC_CHECKS);
    }

    #[test]
    fn test_user_checks_always_enabled() {
        for checks in [CheckSet::empty(), DIV_CHECKS, AUTOMATIC_CHECKS] {
            assert!(checks.enables(ErrorCategory::UserCheck));
        }
        assert!(!DIV_CHECKS.enables(ErrorCategory::NonFinite));
        assert!(DIV_CHECKS.enables(ErrorCategory::DivisionByZero));
        assert!(INDEX_CHECKS.enables(ErrorCategory::OutOfBounds));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("div, index".parse::<CheckSet>(), Ok(DIV_CHECKS | INDEX_CHECKS));
        assert_eq!("all".parse::<CheckSet>(), Ok(ALL_CHECKS));
        assert_eq!("".parse::<CheckSet>(), Ok(CheckSet::empty()));
        assert_eq!(
            "div,bogus".parse::<CheckSet>(),
            Err(CheckifyError::UnknownCheck("bogus".to_string()))
        );
    }
}
