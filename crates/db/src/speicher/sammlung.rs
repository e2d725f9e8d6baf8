//! Dokument-Sammlungen mit eindeutigen Indizes

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::error::DbError;
use crate::repository::DbResult;

/// Eine Sammlung von JSON-Dokumenten, indiziert ueber `id`
#[derive(Debug, Default)]
pub(crate) struct Sammlung {
    dokumente: BTreeMap<String, Value>,
    /// Eindeutige Indizes: Liste der Feldnamen je Index
    eindeutig: Vec<Vec<&'static str>>,
}

impl Sammlung {
    fn index_schluessel(dok: &Value, felder: &[&str]) -> Option<String> {
        let mut teile = Vec::with_capacity(felder.len());
        for feld in felder {
            match dok.get(*feld) {
                Some(Value::Null) | None => return None,
                Some(Value::String(s)) => teile.push(s.clone()),
                Some(anderer) => teile.push(anderer.to_string()),
            }
        }
        Some(teile.join("\u{1f}"))
    }

    /// Prueft alle eindeutigen Indizes gegen die uebrigen Dokumente
    fn konflikt(&self, id: &str, dok: &Value) -> Option<String> {
        for felder in &self.eindeutig {
            let Some(schluessel) = Self::index_schluessel(dok, felder) else {
                continue;
            };
            let belegt = self.dokumente.iter().any(|(andere_id, anderes)| {
                andere_id != id
                    && Self::index_schluessel(anderes, felder).as_deref() == Some(&schluessel)
            });
            if belegt {
                return Some(felder.join(","));
            }
        }
        None
    }

    pub(crate) fn einfuegen(&mut self, id: String, dok: Value) -> DbResult<()> {
        if self.dokumente.contains_key(&id) {
            return Err(DbError::eindeutigkeit(format!("Dokument {id} existiert bereits")));
        }
        if let Some(index) = self.konflikt(&id, &dok) {
            return Err(DbError::eindeutigkeit(format!("Index ({index}) bereits belegt")));
        }
        self.dokumente.insert(id, dok);
        Ok(())
    }

    pub(crate) fn ersetzen(&mut self, id: &str, dok: Value) -> DbResult<()> {
        if !self.dokumente.contains_key(id) {
            return Err(DbError::nicht_gefunden(format!("Dokument {id}")));
        }
        if let Some(index) = self.konflikt(id, &dok) {
            return Err(DbError::eindeutigkeit(format!("Index ({index}) bereits belegt")));
        }
        self.dokumente.insert(id.to_string(), dok);
        Ok(())
    }

    pub(crate) fn holen(&self, id: &str) -> Option<&Value> {
        self.dokumente.get(id)
    }

    /// Alle Dokumente, deren Felder den Filterwerten entsprechen
    pub(crate) fn finden(&self, filter: &[(&str, Value)]) -> Vec<&Value> {
        self.dokumente
            .values()
            .filter(|dok| filter.iter().all(|(feld, wert)| dok.get(*feld) == Some(wert)))
            .collect()
    }

    pub(crate) fn alle(&self) -> impl Iterator<Item = &Value> {
        self.dokumente.values()
    }

    pub(crate) fn loeschen(&mut self, id: &str) -> bool {
        self.dokumente.remove(id).is_some()
    }

    /// Loescht alle passenden Dokumente, gibt die Anzahl zurueck
    pub(crate) fn loeschen_wo(&mut self, filter: &[(&str, Value)]) -> u64 {
        let vorher = self.dokumente.len();
        self.dokumente
            .retain(|_, dok| !filter.iter().all(|(feld, wert)| dok.get(*feld) == Some(wert)));
        (vorher - self.dokumente.len()) as u64
    }

    pub(crate) fn anzahl(&self) -> u64 {
        self.dokumente.len() as u64
    }
}

/// Gesamter Dokumentenspeicher
#[derive(Debug, Default)]
pub(crate) struct Datenbank {
    sammlungen: HashMap<&'static str, Sammlung>,
}

impl Datenbank {
    /// Legt eine Sammlung samt Indizes an; bestehende bleiben unveraendert
    pub(crate) fn sammlung_sicherstellen(
        &mut self,
        name: &'static str,
        eindeutig: &[&[&'static str]],
    ) -> bool {
        if self.sammlungen.contains_key(name) {
            return false;
        }
        self.sammlungen.insert(
            name,
            Sammlung {
                dokumente: BTreeMap::new(),
                eindeutig: eindeutig.iter().map(|felder| felder.to_vec()).collect(),
            },
        );
        true
    }

    pub(crate) fn sammlung(&self, name: &str) -> DbResult<&Sammlung> {
        self.sammlungen
            .get(name)
            .ok_or_else(|| DbError::intern(format!("Sammlung '{name}' fehlt")))
    }

    pub(crate) fn sammlung_mut(&mut self, name: &str) -> DbResult<&mut Sammlung> {
        self.sammlungen
            .get_mut(name)
            .ok_or_else(|| DbError::intern(format!("Sammlung '{name}' fehlt")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn db() -> Datenbank {
        let mut db = Datenbank::default();
        db.sammlung_sicherstellen("users", &[&["email"]]);
        db.sammlung_sicherstellen("anfragen", &[&["email", "identifier"]]);
        db
    }

    #[test]
    fn sicherstellen_ist_idempotent() {
        let mut db = db();
        db.sammlung_mut("users")
            .unwrap()
            .einfuegen("1".into(), json!({"email": "a@b.c"}))
            .unwrap();
        assert!(!db.sammlung_sicherstellen("users", &[&["email"]]));
        assert_eq!(db.sammlung("users").unwrap().anzahl(), 1);
    }

    #[test]
    fn eindeutiger_index_verhindert_duplikat() {
        let mut db = db();
        let users = db.sammlung_mut("users").unwrap();
        users.einfuegen("1".into(), json!({"email": "a@b.c"})).unwrap();
        let fehler = users
            .einfuegen("2".into(), json!({"email": "a@b.c"}))
            .unwrap_err();
        assert!(fehler.ist_eindeutigkeit());
    }

    #[test]
    fn zusammengesetzter_index() {
        let mut db = db();
        let anfragen = db.sammlung_mut("anfragen").unwrap();
        anfragen
            .einfuegen("1".into(), json!({"email": "a", "identifier": "x"}))
            .unwrap();
        anfragen
            .einfuegen("2".into(), json!({"email": "a", "identifier": "y"}))
            .unwrap();
        assert!(anfragen
            .einfuegen("3".into(), json!({"email": "a", "identifier": "x"}))
            .is_err());
    }

    #[test]
    fn ersetzen_prueft_index_gegen_andere() {
        let mut db = db();
        let users = db.sammlung_mut("users").unwrap();
        users.einfuegen("1".into(), json!({"email": "a"})).unwrap();
        users.einfuegen("2".into(), json!({"email": "b"})).unwrap();

        // eigenes Dokument mit gleicher E-Mail ist erlaubt
        users.ersetzen("1", json!({"email": "a", "x": 1})).unwrap();
        assert!(users.ersetzen("2", json!({"email": "a"})).is_err());
        assert!(users
            .ersetzen("3", json!({"email": "c"}))
            .unwrap_err()
            .ist_nicht_gefunden());
    }

    #[test]
    fn finden_und_loeschen_wo() {
        let mut db = db();
        let users = db.sammlung_mut("users").unwrap();
        users
            .einfuegen("1".into(), json!({"email": "a", "gruppe": "x"}))
            .unwrap();
        users
            .einfuegen("2".into(), json!({"email": "b", "gruppe": "x"}))
            .unwrap();
        users
            .einfuegen("3".into(), json!({"email": "c", "gruppe": "y"}))
            .unwrap();

        assert_eq!(users.finden(&[("gruppe", json!("x"))]).len(), 2);
        assert_eq!(users.loeschen_wo(&[("gruppe", json!("x"))]), 2);
        assert_eq!(users.loeschen_wo(&[("gruppe", json!("x"))]), 0);
        assert_eq!(users.anzahl(), 1);
    }
}
