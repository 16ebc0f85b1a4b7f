//! Flat ΛCDM cosmology.
//!
//! The expansion rate is
//!
//! $E(z) = \sqrt{(1+z)^3 \left[\Omega_m + \Omega_\gamma (1 + \rho_\nu(z)/\rho_\gamma(z)) (1+z)\right] + \Omega_\Lambda}$
//!
//! with the photon density built from the CMB temperature and
//! $\Omega_\Lambda = 1 - \Omega_m - \Omega_\gamma - \Omega_\nu$ so the universe
//! is flat. Massless neutrinos scale like radiation. Massive species use the
//! Komatsu et al. (2011) fitting function for the relativistic-to-matter
//! transition,
//!
//! $\frac{\rho_\nu}{\rho_\gamma} = 0.2271\, \frac{N_\text{eff}}{N_\nu} \sum_i \left[1 + (k y_i)^p\right]^{1/p}, \quad y_i = \frac{m_i}{k_B T_\nu (1+z)}$
//!
//! with $k = 0.3173$, $p = 1.83$ and each massless species contributing 1 to the sum.
//! Comoving distances are obtained by Simpson quadrature of $1/E(z)$.

use serde::{Deserialize, Serialize};

use crate::constants::{KPC_PER_MPC, SPEED_OF_LIGHT_KM_PER_S};
use crate::provider::{check_redshift, CosmologyError, CosmologyProvider};
use crate::quadrature::{simpson, DEFAULT_INTERVALS};

/// Photon density prefactor: $\Omega_\gamma h^2 = 4.48162 \times 10^{-7}\, T_\text{CMB}^4$.
const PHOTON_DENSITY_COEFFICIENT: f64 = 4.481_620_089e-7;

/// Neutrino-to-photon density ratio per species: $\frac{7}{8} (4/11)^{4/3}$.
const NEUTRINO_PHOTON_RATIO: f64 = 0.227_107_317_66;

/// Neutrino-to-photon temperature ratio: $(4/11)^{1/3}$.
const NEUTRINO_TEMPERATURE_RATIO: f64 = 0.713_765_855_503_608_2;

/// Boltzmann constant (eV/K).
const BOLTZMANN_EV_PER_K: f64 = 8.617_333_262e-5;

const NU_FIT_P: f64 = 1.83;
const NU_FIT_K: f64 = 0.3173;

/// Parameters of a flat ΛCDM model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaCdmParams {
    /// Hubble constant (km s⁻¹ Mpc⁻¹).
    pub h0: f64,
    /// Non-relativistic matter density today, excluding massive neutrinos.
    pub omega_m: f64,
    /// CMB temperature today (K). Zero disables radiation and neutrinos.
    pub t_cmb: f64,
    /// Effective number of neutrino species.
    pub n_eff: f64,
    /// Neutrino masses (eV), one per species (`floor(n_eff)` entries).
    /// Empty means every species is massless.
    #[serde(default)]
    pub m_nu: Vec<f64>,
}

/// Flat ΛCDM distance calculator.
#[derive(Debug, Clone)]
pub struct FlatLambdaCdm {
    name: String,
    params: LambdaCdmParams,
    omega_gamma: f64,
    omega_nu: f64,
    omega_lambda: f64,
    /// $m_i / k_B T_\nu$ of each massive species.
    massive_nu_y: Vec<f64>,
    massless_species: usize,
    neff_per_species: f64,
    hubble_distance_kpc: f64,
    intervals: usize,
}

impl FlatLambdaCdm {
    /// Construct a flat ΛCDM model.
    ///
    /// # Arguments
    /// * `name` - Label reported by [`CosmologyProvider::name`].
    /// * `params` - Hubble constant, matter density, CMB temperature and
    ///   neutrino species and masses.
    pub fn new(name: impl Into<String>, params: LambdaCdmParams) -> Result<Self, CosmologyError> {
        let LambdaCdmParams {
            h0,
            omega_m,
            t_cmb,
            n_eff,
            ref m_nu,
        } = params;

        if !(h0.is_finite() && h0 > 0.0) {
            return Err(CosmologyError::InvalidParameters(format!(
                "H0 must be positive, got {h0}"
            )));
        }
        if !(omega_m.is_finite() && (0.0..=1.0).contains(&omega_m)) {
            return Err(CosmologyError::InvalidParameters(format!(
                "Omega_m must lie in [0, 1], got {omega_m}"
            )));
        }
        if !(t_cmb.is_finite() && t_cmb >= 0.0 && n_eff.is_finite() && n_eff >= 0.0) {
            return Err(CosmologyError::InvalidParameters(format!(
                "T_cmb and N_eff must be non-negative, got {t_cmb} and {n_eff}"
            )));
        }
        if !m_nu.is_empty() {
            let species = n_eff.floor() as usize;
            if m_nu.len() != species {
                return Err(CosmologyError::InvalidParameters(format!(
                    "expected {species} neutrino masses for N_eff = {n_eff}, got {}",
                    m_nu.len()
                )));
            }
            if let Some(m) = m_nu.iter().find(|m| !(m.is_finite() && **m >= 0.0)) {
                return Err(CosmologyError::InvalidParameters(format!(
                    "neutrino masses must be non-negative, got {m}"
                )));
            }
        }

        let cosmo = Self::unchecked(name.into(), params);
        if cosmo.omega_lambda < 0.0 {
            return Err(CosmologyError::InvalidParameters(format!(
                "Omega_m + Omega_r exceeds unity ({})",
                omega_m + cosmo.omega_radiation()
            )));
        }
        Ok(cosmo)
    }

    /// Planck 2015 (TT,TE,EE+lowP+lensing+ext) parameters, with one
    /// 0.06 eV neutrino.
    pub fn planck15() -> Self {
        Self::unchecked(
            "Planck15".into(),
            LambdaCdmParams {
                h0: 67.74,
                omega_m: 0.3075,
                t_cmb: 2.7255,
                n_eff: 3.046,
                m_nu: vec![0.0, 0.0, 0.06],
            },
        )
    }

    /// WMAP 9-year parameters (massless neutrinos).
    pub fn wmap9() -> Self {
        Self::unchecked(
            "WMAP9".into(),
            LambdaCdmParams {
                h0: 69.32,
                omega_m: 0.2865,
                t_cmb: 2.725,
                n_eff: 3.04,
                m_nu: Vec::new(),
            },
        )
    }

    /// Look up a preset by (case-insensitive) name.
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "planck15" => Some(Self::planck15()),
            "wmap9" => Some(Self::wmap9()),
            _ => None,
        }
    }

    // Derived densities without validation; presets go through here directly.
    fn unchecked(name: String, params: LambdaCdmParams) -> Self {
        let h = params.h0 / 100.0;
        let omega_gamma = PHOTON_DENSITY_COEFFICIENT * params.t_cmb.powi(4) / (h * h);

        let (massive_nu_y, massless_species, neff_per_species) = if params.m_nu.is_empty() || params.t_cmb == 0.0 {
            (Vec::new(), 0, 0.0)
        } else {
            let t_nu = NEUTRINO_TEMPERATURE_RATIO * params.t_cmb;
            let massive = params
                .m_nu
                .iter()
                .filter(|&&m| m > 0.0)
                .map(|m| m / (BOLTZMANN_EV_PER_K * t_nu))
                .collect();
            let massless = params.m_nu.iter().filter(|&&m| m == 0.0).count();
            (massive, massless, params.n_eff / params.m_nu.len() as f64)
        };

        let mut cosmo = Self {
            name,
            params,
            omega_gamma,
            omega_nu: 0.0,
            omega_lambda: 0.0,
            massive_nu_y,
            massless_species,
            neff_per_species,
            hubble_distance_kpc: 0.0,
            intervals: DEFAULT_INTERVALS,
        };
        cosmo.omega_nu = omega_gamma * cosmo.neutrino_relative_density(0.0);
        cosmo.omega_lambda = 1.0 - cosmo.params.omega_m - omega_gamma - cosmo.omega_nu;
        cosmo.hubble_distance_kpc = SPEED_OF_LIGHT_KM_PER_S / cosmo.params.h0 * KPC_PER_MPC;
        cosmo
    }

    /// Override the number of Simpson intervals used for distance integrals.
    pub fn with_intervals(mut self, intervals: usize) -> Self {
        self.intervals = intervals;
        self
    }

    pub fn params(&self) -> &LambdaCdmParams {
        &self.params
    }

    pub fn omega_photons(&self) -> f64 {
        self.omega_gamma
    }

    /// Neutrino density today, massive species included.
    pub fn omega_neutrinos(&self) -> f64 {
        self.omega_nu
    }

    /// Photons plus neutrinos today.
    pub fn omega_radiation(&self) -> f64 {
        self.omega_gamma + self.omega_nu
    }

    pub fn omega_lambda(&self) -> f64 {
        self.omega_lambda
    }

    pub fn has_massive_neutrinos(&self) -> bool {
        !self.massive_nu_y.is_empty()
    }

    /// Hubble distance $c / H_0$ (kpc).
    pub fn hubble_distance_kpc(&self) -> f64 {
        self.hubble_distance_kpc
    }

    /// Neutrino-to-photon energy density ratio at redshift `z`.
    pub fn neutrino_relative_density(&self, z: f64) -> f64 {
        if !self.has_massive_neutrinos() {
            return NEUTRINO_PHOTON_RATIO * self.params.n_eff;
        }
        let zp1 = 1.0 + z;
        let massive: f64 = self
            .massive_nu_y
            .iter()
            .map(|y| (1.0 + (NU_FIT_K * y / zp1).powf(NU_FIT_P)).powf(1.0 / NU_FIT_P))
            .sum();
        NEUTRINO_PHOTON_RATIO * self.neff_per_species * (massive + self.massless_species as f64)
    }

    /// Dimensionless expansion rate $E(z) = H(z)/H_0$.
    pub fn efunc(&self, z: f64) -> f64 {
        let zp1 = 1.0 + z;
        let omega_r = self.omega_gamma * (1.0 + self.neutrino_relative_density(z));
        (zp1.powi(3) * (self.params.omega_m + omega_r * zp1) + self.omega_lambda).sqrt()
    }
}

impl CosmologyProvider for FlatLambdaCdm {
    fn name(&self) -> &str {
        &self.name
    }

    fn comoving_distance_kpc(&self, z: f64) -> Result<f64, CosmologyError> {
        check_redshift(z)?;
        let integral = simpson(|zz| 1.0 / self.efunc(zz), 0.0, z, self.intervals);
        Ok(self.hubble_distance_kpc * integral)
    }
}
