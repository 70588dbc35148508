//! Static material catalog. Seed data for the inventory, never mutated at runtime.

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Material {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub code: String,
    #[n(2)]
    pub name: String,
}

impl Material {
    pub fn new(id: impl Into<String>, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            name: name.into(),
        }
    }
}

// (id, code, name)
const SEED: &[(&str, &str, &str)] = &[
    ("m1", "001", "Luva isolante classe 2"),
    ("m2", "002", "Luva de cobertura"),
    ("m3", "003", "Manta isolante"),
    ("m4", "004", "Cobertura para condutor"),
    ("m5", "005", "Conector cunha"),
    ("m6", "006", "Cabo de aluminio 4 AWG"),
    ("m7", "007", "Isolador de pino"),
    ("m8", "008", "Fita isolante"),
    ("m9", "009", "Grampo de linha viva"),
    ("m10", "010", "Cinta de poste"),
];

/// The materials every fresh inventory starts from.
pub fn materials() -> Vec<Material> {
    SEED.iter()
        .map(|(id, code, name)| Material::new(*id, *code, *name))
        .collect()
}
