//! Fixed enumerations carried by a quotation header.
//!
//! Both enums serialise to the exact strings stored in the `cotizaciones`
//! table (`incoterm`, `modo_transporte`), so they can be used directly on
//! the wire.

use serde::{Deserialize, Serialize};

// ============================================================================
// TRADE TERMS
// ============================================================================

/// Incoterms 2020 trade terms accepted on a quotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Incoterm {
    Exw,
    Fca,
    Cpt,
    Cip,
    Dap,
    Dpu,
    Ddp,
    Fas,
    Fob,
    Cfr,
    Cif,
}

impl Incoterm {
    pub const ALL: [Incoterm; 11] = [
        Self::Exw,
        Self::Fca,
        Self::Cpt,
        Self::Cip,
        Self::Dap,
        Self::Dpu,
        Self::Ddp,
        Self::Fas,
        Self::Fob,
        Self::Cfr,
        Self::Cif,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::Exw => "EXW",
            Self::Fca => "FCA",
            Self::Cpt => "CPT",
            Self::Cip => "CIP",
            Self::Dap => "DAP",
            Self::Dpu => "DPU",
            Self::Ddp => "DDP",
            Self::Fas => "FAS",
            Self::Fob => "FOB",
            Self::Cfr => "CFR",
            Self::Cif => "CIF",
        }
    }
}

impl std::fmt::Display for Incoterm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Incoterm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|term| term.code() == wanted)
            .ok_or_else(|| format!("Unknown incoterm: {s}"))
    }
}

// ============================================================================
// TRANSPORT MODES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportMode {
    #[serde(rename = "Marítimo")]
    Maritime,
    #[serde(rename = "Aéreo")]
    Air,
    #[serde(rename = "Terrestre")]
    Land,
    #[serde(rename = "Multimodal")]
    Multimodal,
}

impl TransportMode {
    pub const ALL: [TransportMode; 4] = [Self::Maritime, Self::Air, Self::Land, Self::Multimodal];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Maritime => "Marítimo",
            Self::Air => "Aéreo",
            Self::Land => "Terrestre",
            Self::Multimodal => "Multimodal",
        }
    }
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        match wanted.as_str() {
            "marítimo" | "maritimo" => Ok(Self::Maritime),
            "aéreo" | "aereo" => Ok(Self::Air),
            "terrestre" => Ok(Self::Land),
            "multimodal" => Ok(Self::Multimodal),
            _ => Err(format!("Unknown transport mode: {s}")),
        }
    }
}
