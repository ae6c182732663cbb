use super::{Calculator, DivideByZeroError};

/// The default, stateless calculator
#[derive(Debug, Default, Clone, Copy, crate::Server)]
#[service(crate::calculator::Calculator)]
pub struct CalculatorHandler;

impl Calculator for CalculatorHandler {
    fn add(&self, a: i64, b: i64) -> i64 {
        a.wrapping_add(b)
    }

    fn subtract(&self, a: i64, b: i64) -> i64 {
        a.wrapping_sub(b)
    }

    fn multiply(&self, a: i64, b: i64) -> i64 {
        a.wrapping_mul(b)
    }

    fn divide(&self, a: i64, b: i64) -> Result<i64, DivideByZeroError> {
        if b == 0 {
            return Err(DivideByZeroError);
        }
        Ok(a.wrapping_div(b))
    }
}
