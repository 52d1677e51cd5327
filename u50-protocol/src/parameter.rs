use std::fmt;

/// Measured quantity of a parameter block, identified by its two-character code.
///
/// Slot identity in a frame is positional; the code is only used to cross-check
/// which quantity a slot actually carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    Temperature,
    Ph,
    PhMv,
    Orp,
    Conductivity,
    Turbidity,
    DissolvedOxygen,
    DoSaturation,
    Tds,
    Salinity,
    SpecificGravity,
    Depth,
    /// Slot not assigned to a sensor (code `0`).
    Unused,
}

impl ParameterKind {
    /// Decode from the code field. Surrounding spaces and leading zeros are ignored.
    pub fn from_code(code: &str) -> Option<Self> {
        let code: u8 = code.trim().parse().ok()?;
        match code {
            10 => Some(Self::Temperature),
            1 => Some(Self::Ph),
            24 => Some(Self::PhMv),
            2 => Some(Self::Orp),
            6 => Some(Self::Conductivity),
            3 => Some(Self::Turbidity),
            4 => Some(Self::DissolvedOxygen),
            22 => Some(Self::DoSaturation),
            8 => Some(Self::Tds),
            7 => Some(Self::Salinity),
            9 => Some(Self::SpecificGravity),
            11 => Some(Self::Depth),
            0 => Some(Self::Unused),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Temperature => 10,
            Self::Ph => 1,
            Self::PhMv => 24,
            Self::Orp => 2,
            Self::Conductivity => 6,
            Self::Turbidity => 3,
            Self::DissolvedOxygen => 4,
            Self::DoSaturation => 22,
            Self::Tds => 8,
            Self::Salinity => 7,
            Self::SpecificGravity => 9,
            Self::Depth => 11,
            Self::Unused => 0,
        }
    }

    /// Display unit of the quantity.
    pub fn unit(self) -> &'static str {
        match self {
            Self::Temperature => "°C",
            Self::Ph => "pH",
            Self::PhMv | Self::Orp => "mV",
            Self::Conductivity => "mS/cm",
            Self::Turbidity => "NTU",
            Self::DissolvedOxygen => "mg/L",
            Self::DoSaturation => "%",
            Self::Tds => "g/L",
            Self::Salinity => "ppt",
            Self::SpecificGravity => "σt",
            Self::Depth => "m",
            Self::Unused => "-",
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Temperature => "Temperature",
            Self::Ph => "pH",
            Self::PhMv => "pH mV",
            Self::Orp => "ORP",
            Self::Conductivity => "Conductivity",
            Self::Turbidity => "Turbidity",
            Self::DissolvedOxygen => "Dissolved oxygen",
            Self::DoSaturation => "DO%",
            Self::Tds => "TDS",
            Self::Salinity => "Salinity",
            Self::SpecificGravity => "Specific gravity",
            Self::Depth => "Depth",
            Self::Unused => "---",
        };
        f.pad(name)
    }
}
