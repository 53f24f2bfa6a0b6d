//! Password strength policy.
//!
//! Length limits are enforced on the request body, not here.

use std::fmt;
use unicode_general_category::{get_general_category, GeneralCategory};

/// Character classes a secure password must contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Digit,
    Lowercase,
    Uppercase,
    Symbol,
}

impl CharClass {
    const ALL: [CharClass; 4] = [
        CharClass::Digit,
        CharClass::Lowercase,
        CharClass::Uppercase,
        CharClass::Symbol,
    ];

    /// Class of `c` by Unicode general category. Marks, format characters,
    /// separators, private-use and unassigned code points belong to none.
    fn of(c: char) -> Option<CharClass> {
        use GeneralCategory::*;

        match get_general_category(c) {
            DecimalNumber | LetterNumber | OtherNumber => Some(CharClass::Digit),
            LowercaseLetter => Some(CharClass::Lowercase),
            UppercaseLetter => Some(CharClass::Uppercase),
            ConnectorPunctuation | DashPunctuation | OpenPunctuation | ClosePunctuation
            | InitialPunctuation | FinalPunctuation | OtherPunctuation | MathSymbol
            | CurrencySymbol | ModifierSymbol | OtherSymbol => Some(CharClass::Symbol),
            _ => None,
        }
    }

    fn bit(self) -> u8 {
        match self {
            CharClass::Digit => 0b0001,
            CharClass::Lowercase => 0b0010,
            CharClass::Uppercase => 0b0100,
            CharClass::Symbol => 0b1000,
        }
    }
}

impl fmt::Display for CharClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CharClass::Digit => "digit",
            CharClass::Lowercase => "lowercase letter",
            CharClass::Uppercase => "uppercase letter",
            CharClass::Symbol => "punctuation or symbol",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordPolicy;

impl PasswordPolicy {
    /// True iff `password` has at least one character of every class.
    pub fn is_secure(password: &str) -> bool {
        Self::missing_classes(password).is_empty()
    }

    /// Classes absent from `password`, in check order.
    pub fn missing_classes(password: &str) -> Vec<CharClass> {
        let seen = password
            .chars()
            .filter_map(CharClass::of)
            .fold(0u8, |seen, class| seen | class.bit());

        CharClass::ALL
            .into_iter()
            .filter(|class| seen & class.bit() == 0)
            .collect()
    }
}
