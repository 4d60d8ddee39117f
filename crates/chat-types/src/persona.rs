use serde::{Deserialize, Serialize};

/// A server-side behavioural profile, e.g. "therapist" or "coach".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// Models the backend offers, plus its current default.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelCatalog {
    pub models: Vec<String>,
    pub current: String,
}

impl ModelCatalog {
    pub fn contains(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersonaCatalog {
    /// Sorted by id
    pub personas: Vec<Persona>,
    pub current: String,
}

impl PersonaCatalog {
    pub fn get(&self, id: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.id == id)
    }
}
