use std::panic::Location;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Uniform error taxonomy for every fallible operation in the analytics core.
///
/// Mirrors the pyfolio `ErrorCode` enum: library functions never panic on bad
/// input and never throw across a component boundary, they return `Result`.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnalyticsError {
    #[error("invalid input: {message}{}", context_suffix(.context))]
    InvalidInput { message: String, context: String },

    #[error("insufficient data: {message}{}", context_suffix(.context))]
    InsufficientData { message: String, context: String },

    #[error("missing data: {message}{}", context_suffix(.context))]
    MissingData { message: String, context: String },

    #[error("division by zero: {message}{}", context_suffix(.context))]
    DivisionByZero { message: String, context: String },

    #[error("numeric overflow: {message}{}", context_suffix(.context))]
    NumericOverflow { message: String, context: String },

    #[error("calculation error: {message}{}", context_suffix(.context))]
    CalculationError { message: String, context: String },

    #[error("invalid date range: {message}{}", context_suffix(.context))]
    InvalidDateRange { message: String, context: String },

    #[error("invalid symbol: {message}{}", context_suffix(.context))]
    InvalidSymbol { message: String, context: String },
}

fn context_suffix(context: &str) -> String {
    if context.is_empty() {
        String::new()
    } else {
        format!(" ({context})")
    }
}

impl AnalyticsError {
    #[track_caller]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            context: location_context(),
        }
    }

    #[track_caller]
    pub fn insufficient_data(message: impl Into<String>) -> Self {
        Self::InsufficientData {
            message: message.into(),
            context: location_context(),
        }
    }

    #[track_caller]
    pub fn missing_data(message: impl Into<String>) -> Self {
        Self::MissingData {
            message: message.into(),
            context: location_context(),
        }
    }

    #[track_caller]
    pub fn division_by_zero(message: impl Into<String>) -> Self {
        Self::DivisionByZero {
            message: message.into(),
            context: location_context(),
        }
    }

    #[track_caller]
    pub fn numeric_overflow(message: impl Into<String>) -> Self {
        Self::NumericOverflow {
            message: message.into(),
            context: location_context(),
        }
    }

    #[track_caller]
    pub fn calculation_error(message: impl Into<String>) -> Self {
        Self::CalculationError {
            message: message.into(),
            context: location_context(),
        }
    }

    #[track_caller]
    pub fn invalid_date_range(message: impl Into<String>) -> Self {
        Self::InvalidDateRange {
            message: message.into(),
            context: location_context(),
        }
    }

    #[track_caller]
    pub fn invalid_symbol(message: impl Into<String>) -> Self {
        Self::InvalidSymbol {
            message: message.into(),
            context: location_context(),
        }
    }
}

#[track_caller]
fn location_context() -> String {
    let loc = Location::caller();
    format!("{}:{}", loc.file(), loc.line())
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
