// The anomaly list of the most recent scan
use crate::domain::anomaly::{Anomaly, AnomalyRef};
use crate::domain::error::CleanerError;
use std::collections::HashMap;
use uuid::Uuid;

/// Replaced wholesale by every scan; positions and ids are only valid until then.
#[derive(Debug, Default)]
pub struct AnomalyBook {
    anomalies: Vec<Anomaly>,
    positions: HashMap<Uuid, usize>,
}

impl AnomalyBook {
    pub fn replace(&mut self, anomalies: Vec<Anomaly>) {
        self.positions = anomalies
            .iter()
            .enumerate()
            .map(|(idx, a)| (a.id, idx))
            .collect();
        self.anomalies = anomalies;
    }

    pub fn clear(&mut self) {
        self.replace(Vec::new());
    }

    pub fn anomalies(&self) -> &[Anomaly] {
        &self.anomalies
    }

    pub fn resolve(&self, reference: AnomalyRef) -> Result<usize, CleanerError> {
        let idx = match reference {
            AnomalyRef::Index(idx) => idx,
            AnomalyRef::Id(id) => *self.positions.get(&id).ok_or_else(|| {
                CleanerError::InvalidSelection(format!("no anomaly with id {} in the current scan", id))
            })?,
        };
        if idx >= self.anomalies.len() {
            return Err(CleanerError::InvalidSelection(format!(
                "no anomaly at index {} (last scan found {})",
                idx,
                self.anomalies.len()
            )));
        }
        Ok(idx)
    }

    pub fn get(&self, reference: AnomalyRef) -> Result<&Anomaly, CleanerError> {
        let idx = self.resolve(reference)?;
        Ok(&self.anomalies[idx])
    }

    pub fn get_mut(&mut self, reference: AnomalyRef) -> Result<&mut Anomaly, CleanerError> {
        let idx = self.resolve(reference)?;
        Ok(&mut self.anomalies[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::anomaly::AnomalyKind;
    use chrono::Utc;

    fn anomaly(value: f64) -> Anomaly {
        Anomaly {
            id: Uuid::new_v4(),
            kind: AnomalyKind::OutOfBounds,
            time: Utc::now(),
            value,
            prev_value: None,
            next_value: None,
            measurement: "W".to_string(),
            entity_id: "hm800_power".to_string(),
            friendly_name: None,
            context_before: Vec::new(),
            context_after: Vec::new(),
        }
    }

    #[test]
    fn test_resolve_by_index_and_id() {
        let mut book = AnomalyBook::default();
        let first = anomaly(1.0);
        let second = anomaly(2.0);
        let second_id = second.id;
        book.replace(vec![first, second]);

        assert_eq!(book.resolve(AnomalyRef::Index(0)), Ok(0));
        assert_eq!(book.resolve(AnomalyRef::Id(second_id)), Ok(1));
        assert!(book.resolve(AnomalyRef::Index(2)).is_err());
        assert!(book.resolve(AnomalyRef::Id(Uuid::new_v4())).is_err());
    }

    #[test]
    fn test_replace_invalidates_old_ids() {
        let mut book = AnomalyBook::default();
        let old = anomaly(1.0);
        let old_id = old.id;
        book.replace(vec![old]);
        book.replace(vec![anomaly(5.0)]);

        assert!(book.resolve(AnomalyRef::Id(old_id)).is_err());
        assert_eq!(book.get(AnomalyRef::Index(0)).map(|a| a.value), Ok(5.0));
    }

    #[test]
    fn test_get_mut_updates_in_place() {
        let mut book = AnomalyBook::default();
        book.replace(vec![anomaly(1.0)]);
        book.get_mut(AnomalyRef::Index(0)).unwrap().value = 3.0;
        assert_eq!(book.anomalies()[0].value, 3.0);
    }
}
