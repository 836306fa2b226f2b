//! Stack machine instruction set

use std::fmt;

macro_rules! opcodes {
    ($($name:ident = $code:expr),* $(,)?) => {
        /// SM opcodes with their numeric encodings
        #[allow(clippy::upper_case_acronyms)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $($name = $code,)*
        }

        impl Opcode {
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$name => stringify!($name),)*
                }
            }
        }
    };
}

opcodes! {
    HALT = 0, NOOP = 1, TRAP = 2,
    ZERO = 3, FALSE = 4, TRUE = 5,
    TYPE = 7, ITYPE = 8, FTYPE = 9,
    ADD = 11, SUB = 12, MUL = 13, DIV = 14, REM = 15, POW = 16, CHS = 17, ABS = 18,
    GT = 21, GE = 22, LT = 23, LE = 24, EQ = 25, NE = 26,
    AND = 31, OR = 32, XOR = 33, NOT = 34,
    BT = 35, BF = 36, BR = 37,
    L = 40, LB = 41, LH = 42, ST = 43,
    STEP = 51, ALLOC = 52, ARRAY = 53, INDEX = 54, SIZE = 55, DUP = 56,
    READF = 60, READI = 61, VALPR = 62, STRPR = 63, CHRPR = 64, NEWLN = 65, SPACE = 66,
    RVAL = 70, RETN = 71, JS2 = 72,
    LV0 = 80, LV1 = 81, LV2 = 82,
    LA0 = 90, LA1 = 91, LA2 = 92,
}

impl Opcode {
    /// Load the value at an offset in the given addressing level
    pub fn load_value(level: u8) -> Opcode {
        match level {
            0 => Opcode::LV0,
            1 => Opcode::LV1,
            _ => Opcode::LV2,
        }
    }

    /// Load the address of an offset in the given addressing level
    pub fn load_address(level: u8) -> Opcode {
        match level {
            0 => Opcode::LA0,
            1 => Opcode::LA1,
            _ => Opcode::LA2,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(Opcode::HALT as u8, 0);
        assert_eq!(Opcode::FTYPE as u8, 9);
        assert_eq!(Opcode::INDEX as u8, 54);
        assert_eq!(Opcode::JS2 as u8, 72);
        assert_eq!(Opcode::LA2 as u8, 92);
    }

    #[test]
    fn test_mnemonics() {
        assert_eq!(Opcode::STRPR.mnemonic(), "STRPR");
        assert_eq!(Opcode::NEWLN.to_string(), "NEWLN");
    }

    #[test]
    fn test_level_helpers() {
        assert_eq!(Opcode::load_value(1), Opcode::LV1);
        assert_eq!(Opcode::load_address(0).to_string(), "LA0");
    }
}
