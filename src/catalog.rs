use crate::error::{CatalogError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One orderable volunteer service, keyed by subprogram id.
///
/// `service_name` and `subprogram_name` are the backend's own labels
/// (`"61~ACOMPAÑAMIENTO"` style) and go into submission payloads verbatim;
/// `spoken_name` is what the skill says out loud.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCatalogEntry {
    pub id: String,
    pub enabled: bool,
    pub service_code: String,
    pub subprogram_code: String,
    pub service_name: String,
    pub subprogram_name: String,
    pub spoken_name: String,
    /// Carries an eligibility advisory for blind families when selected.
    pub family_only: bool,
}

/// Immutable catalog of services, injected at startup.
///
/// Disabled entries stay in the catalog (the backend still knows them) but
/// are never offered nor accepted.
#[derive(Debug, Clone)]
pub struct ServiceCatalog {
    entries: BTreeMap<String, ServiceCatalogEntry>,
}

impl ServiceCatalog {
    pub fn new(entries: Vec<ServiceCatalogEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| (entry.id.clone(), entry))
            .collect();
        Self { entries }
    }

    /// Look up an entry a user may actually request.
    pub fn resolve(&self, id: &str) -> Result<&ServiceCatalogEntry> {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| CatalogError::UnknownService(id.to_string()))?;
        if !entry.enabled {
            return Err(CatalogError::DisabledService(id.to_string()).into());
        }
        Ok(entry)
    }

    /// Enabled entries, in stable id order.
    pub fn offered(&self) -> impl Iterator<Item = &ServiceCatalogEntry> {
        self.entries.values().filter(|entry| entry.enabled)
    }

    /// The standard national-association catalog.
    pub fn standard() -> Self {
        fn entry(
            id: &str,
            enabled: bool,
            service_code: &str,
            service_name: &str,
            subprogram_name: &str,
            spoken_name: &str,
        ) -> ServiceCatalogEntry {
            ServiceCatalogEntry {
                id: id.to_string(),
                enabled,
                service_code: service_code.to_string(),
                subprogram_code: id.to_string(),
                service_name: service_name.to_string(),
                subprogram_name: format!("{id}~{subprogram_name}"),
                spoken_name: spoken_name.to_string(),
                family_only: id == "65100",
            }
        }

        const INFO: &str = "174~ACCESO A LA INFORMACIÓN";
        const ACCOMP: &str = "61~ACOMPAÑAMIENTO";
        const CULTURAL: &str = "65~CULTURAL RECREATIVO";
        const SPORTS: &str = "64~DEPORTIVO";
        const OUTREACH: &str = "80~DIFUSIÓN/TUTORIZACIÓN";
        const INTL: &str = "70~VOLUNTARIADO INTERNACIONAL";

        Self::new(vec![
            entry("17400", true, "174", INFO, "Sin especificar/sin seleccionar/en general", "acceso a la información"),
            entry("17402", true, "174", INFO, "Consolidación braille-tiflotécnica", "consolidación braille-tiflotécnica"),
            entry("17403", true, "174", INFO, "Voluntariado digital", "voluntariado digital"),
            entry("17499", false, "174", INFO, "Otros (no activo)", "otros voluntariado digital"),
            entry("61000", true, "61", ACCOMP, "Sin especificar/sin seleccionar/en general", "acompañamiento"),
            entry("61001", true, "61", ACCOMP, "Acompañamiento telefónico", "acompañamiento telefónico"),
            entry("61100", true, "61", ACCOMP, "Perros guía", "perros guía"),
            entry("61099", false, "61", ACCOMP, "Otros (no activo)", "otros acompañamientos"),
            entry("65000", true, "65", CULTURAL, "Sin especificar/sin seleccionar/en general", "cultural recreativo"),
            entry("65100", true, "65", CULTURAL, "Apoyo a familias", "apoyo a familias"),
            entry("65099", false, "65", CULTURAL, "Otros (no activo)", "otros cultural recreativo"),
            entry("64000", true, "64", SPORTS, "Sin especificar/sin seleccionar/en general", "deportivo"),
            entry("64099", false, "64", SPORTS, "Otros (no activo)", "otros deportivo"),
            entry("8000", false, "80", OUTREACH, "Sin especificar/sin seleccionar/en general", "difusión y tutorización"),
            entry("8001", false, "80", OUTREACH, "Difusión", "difusión"),
            entry("8002", false, "80", OUTREACH, "Tutorización", "tutorización"),
            entry("7000", false, "70", INTL, "Voluntariado internacional", "voluntariado internacional"),
            entry("7002", false, "70", INTL, "Formación e inclusión laboral", "formación e inclusión laboral"),
            entry("7003", false, "70", INTL, "Fortalecimiento mov. asoc. de personas ciegas", "fortalecimiento del movimiento asociativo de personas ciegas"),
            entry("7001", false, "70", INTL, "Inclusión educativa", "inclusión educativa"),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::ServiceCatalog;

    #[test]
    fn resolve_enabled_entry() {
        let catalog = ServiceCatalog::standard();
        let entry = catalog.resolve("61000").unwrap();
        assert_eq!(entry.service_name, "61~ACOMPAÑAMIENTO");
        assert_eq!(entry.spoken_name, "acompañamiento");
        assert!(!entry.family_only);
    }

    #[test]
    fn disabled_entry_is_never_accepted() {
        let catalog = ServiceCatalog::standard();
        assert!(catalog.resolve("65099").is_err());
        assert!(catalog.resolve("8000").is_err());
    }

    #[test]
    fn unknown_id_is_rejected() {
        let catalog = ServiceCatalog::standard();
        assert!(catalog.resolve("99999").is_err());
    }

    #[test]
    fn family_only_flag_marks_the_designated_subprogram() {
        let catalog = ServiceCatalog::standard();
        assert!(catalog.resolve("65100").unwrap().family_only);
        let flagged: Vec<_> = catalog.offered().filter(|e| e.family_only).collect();
        assert_eq!(flagged.len(), 1);
    }

    #[test]
    fn offered_excludes_disabled_entries() {
        let catalog = ServiceCatalog::standard();
        assert!(catalog.offered().all(|entry| entry.enabled));
        assert_eq!(catalog.offered().count(), 9);
    }
}
