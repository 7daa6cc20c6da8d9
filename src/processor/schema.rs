//! Column names of the São Paulo listings dataset.

pub const PRICE: &str = "Preço";
pub const CONDO_FEE: &str = "Condomínio";
pub const SIZE: &str = "Tamanho";
pub const ROOMS: &str = "Quartos";
pub const BATHROOMS: &str = "Banheiros";
pub const SUITES: &str = "Suítes";
pub const PARKING_SPACES: &str = "Vagas";
pub const POOL: &str = "Piscina";
pub const DISTRICT: &str = "Distrito";
pub const NEGOTIATION_TYPE: &str = "Tipo de Negociação";
pub const LATITUDE: &str = "Latitude";
pub const LONGITUDE: &str = "Longitude";

/// Derived column added by [`crate::processor::derive::with_cost_per_area`]
pub const COST_PER_AREA: &str = "Custo por m²";

/// São Paulo centroid used when a listing has no coordinates
pub const DEFAULT_LATITUDE: f64 = -23.5505;
pub const DEFAULT_LONGITUDE: f64 = -46.6333;
