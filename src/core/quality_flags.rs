use crate::types::{PixelRecord, PixelValue};

/// Number of defined bits in a quality flag word
pub const FLAG_BITS: usize = 15;

/// Bit names of one product family's QA word, least significant bit first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagTable {
    pub names: [&'static str; FLAG_BITS],
    /// Appended to every name when flags are written into a pixel record
    pub suffix: &'static str,
}

pub const L2R_FLAGS: FlagTable = FlagTable {
    names: [
        "DATAMISS",
        "LAND",
        "ATMFAIL",
        "CLDICE",
        "CLDAFFCTD",
        "STRAYLIGHT",
        "HIGLINT",
        "MODGLINT",
        "HISOLZ",
        "HITAUA",
        "EPSOUT",
        "OVERITER",
        "NEGNLW",
        "HIGHWS",
        "TURBIDW",
    ],
    suffix: "",
};

pub const L2P_FLAGS: FlagTable = FlagTable {
    names: [
        "DATAMISS",
        "LAND",
        "ATMFAIL",
        "CLDICE",
        "CLDAFFCTD",
        "STRAYLIGHT",
        "HIGLINT",
        "MODGLINT",
        "HISOLZ",
        "HISENZ",
        "TURBIDW",
        "SHALLOW",
        "ITERFAILCDOM",
        "CHLWARN",
        "LOWNLW",
    ],
    suffix: "_GPORTAL",
};

impl FlagTable {
    /// Output field names in bit order
    pub fn field_names(&self) -> Vec<String> {
        self.names
            .iter()
            .map(|name| format!("{}{}", name, self.suffix))
            .collect()
    }

    pub fn bit_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| *n == name)
    }
}

/// Decoded QA word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityFlagSet {
    table: FlagTable,
    bits: [u8; FLAG_BITS],
}

impl QualityFlagSet {
    pub fn table(&self) -> &FlagTable {
        &self.table
    }

    pub fn bits(&self) -> &[u8; FLAG_BITS] {
        &self.bits
    }

    /// Bit by flag name (without suffix)
    pub fn get(&self, name: &str) -> Option<u8> {
        self.table.bit_of(name).map(|i| self.bits[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u8)> + '_ {
        self.table.names.iter().copied().zip(self.bits.iter().copied())
    }

    /// Any of the named flags raised
    pub fn any_set(&self, names: &[&str]) -> bool {
        names.iter().any(|n| self.get(n) == Some(1))
    }

    /// Write every flag into `record` under its suffixed field name
    pub fn write_into(&self, record: &mut PixelRecord) {
        for (name, bit) in self.iter() {
            record.insert(format!("{}{}", name, self.table.suffix), PixelValue::Flag(bit));
        }
    }
}

/// Split a QA integer into its named bits.
///
/// Negative values are taken as their unsigned 16-bit pattern and bits above
/// the table width are ignored.
pub fn decode_flags(value: i64, table: &FlagTable) -> QualityFlagSet {
    let mut remaining = value as u16;
    let mut bits = [0u8; FLAG_BITS];
    for bit in bits.iter_mut() {
        *bit = (remaining % 2) as u8;
        remaining /= 2;
    }
    QualityFlagSet { table: *table, bits }
}

/// Decode a QA sample read through a container
pub fn decode_flag_dn(dn: f64, table: &FlagTable) -> QualityFlagSet {
    decode_flags(dn as i64, table)
}

/// Rebuild the QA integer from its bits
pub fn encode_flags(bits: &[u8; FLAG_BITS]) -> u16 {
    bits.iter()
        .enumerate()
        .fold(0u16, |acc, (i, &b)| acc | (((b & 1) as u16) << i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_has_no_flags() {
        let flags = decode_flags(0, &L2R_FLAGS);
        assert!(flags.iter().all(|(_, b)| b == 0));
    }

    #[test]
    fn test_land_bit() {
        let flags = decode_flags(2, &L2R_FLAGS);
        assert_eq!(flags.get("LAND"), Some(1));
        assert_eq!(flags.get("DATAMISS"), Some(0));
        assert!(flags.any_set(&["LAND", "CLDICE"]));
    }

    #[test]
    fn test_high_bit_discarded() {
        let flags = decode_flags(0x8000 | 1, &L2P_FLAGS);
        assert_eq!(flags.get("DATAMISS"), Some(1));
        assert_eq!(encode_flags(flags.bits()), 1);
    }

    #[test]
    fn test_negative_uses_unsigned_pattern() {
        // -2 as u16 is 0xFFFE
        let flags = decode_flags(-2, &L2P_FLAGS);
        assert_eq!(flags.get("DATAMISS"), Some(0));
        assert_eq!(flags.get("LOWNLW"), Some(1));
    }

    #[test]
    fn test_suffixed_field_names() {
        let mut record = PixelRecord::new();
        decode_flags(1 << 13, &L2P_FLAGS).write_into(&mut record);
        assert_eq!(record.len(), FLAG_BITS);
        assert_eq!(record.get("CHLWARN_GPORTAL"), Some(PixelValue::Flag(1)));
        assert_eq!(record.get("LAND_GPORTAL"), Some(PixelValue::Flag(0)));
    }
}
