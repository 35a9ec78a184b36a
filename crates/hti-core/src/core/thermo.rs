use crate::core::statistics::BlockEstimate;

/// `bar * Å^3` expressed in eV.
pub const BAR_ANGSTROM3_TO_EV: f64 = 1e5 * 1e-30 / 1.602_176_634e-19;

/// Thermo output columns, in the order the generated scripts print them:
/// `step ke pe etotal enthalpy temp press vol c_e_diff[1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Observable {
    Energy,
    Enthalpy,
    Temperature,
    Pressure,
    Volume,
    /// Energy difference estimator for `dU/dlambda`.
    EnergyDerivative,
}

impl Observable {
    pub const THERMO_KEYWORDS: [&'static str; 9] = [
        "step",
        "ke",
        "pe",
        "etotal",
        "enthalpy",
        "temp",
        "press",
        "vol",
        "c_e_diff[1]",
    ];

    pub fn column(self) -> usize {
        match self {
            Observable::Energy => 3,
            Observable::Enthalpy => 4,
            Observable::Temperature => 5,
            Observable::Pressure => 6,
            Observable::Volume => 7,
            Observable::EnergyDerivative => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Estimate {
    pub value: f64,
    pub error: f64,
}

impl Estimate {
    pub fn new(value: f64, error: f64) -> Self {
        Self { value, error }
    }
}

impl From<BlockEstimate> for Estimate {
    fn from(b: BlockEstimate) -> Self {
        Self {
            value: b.mean,
            error: b.standard_error,
        }
    }
}

/// Block-averaged raw thermo columns of one trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawThermo {
    pub energy: BlockEstimate,
    pub enthalpy: BlockEstimate,
    pub temperature: BlockEstimate,
    pub pressure: BlockEstimate,
    pub volume: BlockEstimate,
}

/// Thermodynamic state of the fully coupled end point, extensive quantities per particle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ThermoSummary {
    /// eV
    pub energy: Estimate,
    /// eV
    pub enthalpy: Estimate,
    /// K
    pub temperature: Estimate,
    /// bar
    pub pressure: Estimate,
    /// Å^3
    pub volume: Estimate,
    /// eV
    pub pv: Estimate,
}

impl ThermoSummary {
    pub fn from_raw(raw: &RawThermo, natoms: usize) -> Self {
        let n = natoms as f64;
        let sqrt_n = n.sqrt();
        let p = raw.pressure;
        let v = raw.volume;
        Self {
            energy: raw.energy.per_particle(natoms).into(),
            enthalpy: raw.enthalpy.per_particle(natoms).into(),
            temperature: raw.temperature.into(),
            pressure: p.into(),
            volume: v.per_particle(natoms).into(),
            pv: Estimate {
                value: p.mean * v.mean * BAR_ANGSTROM3_TO_EV / n,
                error: p.standard_error * v.mean * BAR_ANGSTROM3_TO_EV / sqrt_n,
            },
        }
    }

    /// `(label, unit, estimate)` rows in report order.
    pub fn entries(&self) -> [(&'static str, &'static str, Estimate); 6] {
        [
            ("E", "eV", self.energy),
            ("H", "eV", self.enthalpy),
            ("T", "K", self.temperature),
            ("P", "bar", self.pressure),
            ("V", "A^3", self.volume),
            ("PV", "eV", self.pv),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    fn block(mean: f64, standard_error: f64) -> BlockEstimate {
        BlockEstimate {
            mean,
            standard_error,
            blocks: 10,
        }
    }

    #[test]
    fn columns_match_thermo_keywords() {
        assert_eq!(
            Observable::THERMO_KEYWORDS[Observable::EnergyDerivative.column()],
            "c_e_diff[1]"
        );
        assert_eq!(Observable::THERMO_KEYWORDS[Observable::Volume.column()], "vol");
        assert_eq!(Observable::THERMO_KEYWORDS[Observable::Energy.column()], "etotal");
    }

    #[test]
    fn bar_cubic_angstrom_conversion_constant() {
        assert!((BAR_ANGSTROM3_TO_EV - 6.241_509_074e-7).abs() < 1e-15);
    }

    #[test]
    fn summary_normalizes_extensive_quantities_only() {
        let raw = RawThermo {
            energy: block(-400.0, 4.0),
            enthalpy: block(-380.0, 8.0),
            temperature: block(300.0, 2.0),
            pressure: block(1000.0, 50.0),
            volume: block(1600.0, 16.0),
        };
        let s = ThermoSummary::from_raw(&raw, 16);
        assert_eq!(s.energy, Estimate::new(-25.0, 1.0));
        assert_eq!(s.enthalpy, Estimate::new(-23.75, 2.0));
        assert_eq!(s.temperature, Estimate::new(300.0, 2.0));
        assert_eq!(s.pressure, Estimate::new(1000.0, 50.0));
        assert_eq!(s.volume, Estimate::new(100.0, 4.0));
        assert!((s.pv.value - 1000.0 * 100.0 * BAR_ANGSTROM3_TO_EV).abs() < TOLERANCE);
        assert!((s.pv.error - 50.0 * 1600.0 * BAR_ANGSTROM3_TO_EV / 4.0).abs() < TOLERANCE);
    }

    #[test]
    fn entries_are_listed_in_report_order() {
        let labels: Vec<&str> = ThermoSummary::default()
            .entries()
            .iter()
            .map(|(l, _, _)| *l)
            .collect();
        assert_eq!(labels, vec!["E", "H", "T", "P", "V", "PV"]);
    }
}
