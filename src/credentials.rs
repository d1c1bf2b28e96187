//! Stored credential pairs.
//!
//! Layout in the `devstore` namespace: `count`, then `device_<i>` and
//! `password_<i>` for each entry. Updates replace the whole list and write
//! `count` last, so an interrupted update leaves the old count pointing at
//! partly new data rather than a count past the written entries.

use tracing::{debug, info};

use crate::store::{KeyValueStore, StoreError};

pub const NAMESPACE: &str = "devstore";
pub const MAX_DEVICES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub name: String,
    pub secret: String,
}

impl Credential {
    pub fn new(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: secret.into(),
        }
    }
}

/// Parse `name,secret[,name,secret...]`. Pairs with a blank name or secret
/// are skipped, a trailing name without a secret is dropped, and anything
/// past [`MAX_DEVICES`] stored pairs is ignored.
pub fn parse_csv(data: &str) -> Vec<Credential> {
    let fields: Vec<&str> = data.split(',').map(str::trim).collect();
    if fields.len() % 2 == 1 && !(fields.len() == 1 && fields[0].is_empty()) {
        debug!("Odd field count in credential update, dropping last field");
    }
    fields
        .chunks_exact(2)
        .filter(|pair| !pair[0].is_empty() && !pair[1].is_empty())
        .take(MAX_DEVICES)
        .map(|pair| Credential::new(pair[0], pair[1]))
        .collect()
}

/// Cached view of the credential list.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    entries: Vec<Credential>,
}

impl CredentialStore {
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let count = store
            .get_int(NAMESPACE, "count")
            .unwrap_or(0)
            .clamp(0, MAX_DEVICES as i64) as usize;
        let entries = (0..count)
            .map(|i| {
                Credential::new(
                    store
                        .get_str(NAMESPACE, &format!("device_{i}"))
                        .unwrap_or_default(),
                    store
                        .get_str(NAMESPACE, &format!("password_{i}"))
                        .unwrap_or_default(),
                )
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[Credential] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Credential> {
        self.entries.get(index)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|c| c.name.clone()).collect()
    }

    /// Replace every entry and persist.
    pub fn replace_all(
        &mut self,
        store: &mut dyn KeyValueStore,
        mut entries: Vec<Credential>,
    ) -> Result<(), StoreError> {
        entries.truncate(MAX_DEVICES);
        for (i, cred) in entries.iter().enumerate() {
            store.set_str(NAMESPACE, &format!("device_{i}"), &cred.name)?;
            store.set_str(NAMESPACE, &format!("password_{i}"), &cred.secret)?;
        }
        for i in entries.len()..MAX_DEVICES {
            store.remove(NAMESPACE, &format!("device_{i}"))?;
            store.remove(NAMESPACE, &format!("password_{i}"))?;
        }
        store.set_int(NAMESPACE, "count", entries.len() as i64)?;
        info!("Stored {} credential(s)", entries.len());
        self.entries = entries;
        Ok(())
    }

    /// Apply a CSV update; returns the new count.
    pub fn update_from_csv(
        &mut self,
        store: &mut dyn KeyValueStore,
        data: &str,
    ) -> Result<usize, StoreError> {
        self.replace_all(store, parse_csv(data))?;
        Ok(self.len())
    }

    /// Lines for RETRIEVEPW.
    pub fn export_lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|c| format!("{},{}", c.name, c.secret))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_parse_csv_pairs() {
        assert_eq!(
            parse_csv("Site A,pass1,Site B,pass2"),
            vec![Credential::new("Site A", "pass1"), Credential::new("Site B", "pass2")]
        );
        assert_eq!(parse_csv(" mail , secret "), vec![Credential::new("mail", "secret")]);
    }

    #[test]
    fn test_parse_csv_odd_and_empty() {
        assert_eq!(parse_csv("a,1,b"), vec![Credential::new("a", "1")]);
        assert!(parse_csv("").is_empty());
        assert!(parse_csv(",x").is_empty());
    }

    #[test]
    fn test_parse_csv_skips_blank_secret() {
        assert_eq!(parse_csv("a,,b,pw"), vec![Credential::new("b", "pw")]);
        assert!(parse_csv("a, ").is_empty());
    }

    #[test]
    fn test_update_from_csv_counts_only_complete_pairs() {
        let mut store = MemoryStore::new();
        let mut creds = CredentialStore::default();
        assert_eq!(creds.update_from_csv(&mut store, "a,,b,pw").unwrap(), 1);
        assert_eq!(store.get_int(NAMESPACE, "count"), Some(1));
        assert_eq!(store.get_str(NAMESPACE, "device_0").as_deref(), Some("b"));
    }

    #[test]
    fn test_parse_csv_caps_entries() {
        let data: Vec<String> = (0..12).map(|i| format!("n{i},p{i}")).collect();
        assert_eq!(parse_csv(&data.join(",")).len(), MAX_DEVICES);
    }

    #[test]
    fn test_replace_all_overwrites_previous() {
        let mut store = MemoryStore::new();
        let mut creds = CredentialStore::load(&store);
        assert!(creds.is_empty());

        creds
            .update_from_csv(&mut store, "old1,x,old2,y,old3,z")
            .unwrap();
        let count = creds
            .update_from_csv(&mut store, "Site A,pass1,Site B,pass2")
            .unwrap();
        assert_eq!(count, 2);

        let reloaded = CredentialStore::load(&store);
        assert_eq!(
            reloaded.entries(),
            &[Credential::new("Site A", "pass1"), Credential::new("Site B", "pass2")]
        );
        assert_eq!(store.get_int(NAMESPACE, "count"), Some(2));
        assert_eq!(store.get_str(NAMESPACE, "device_2"), None);
    }

    #[test]
    fn test_load_clamps_bad_count() {
        let mut store = MemoryStore::new();
        store.set_int(NAMESPACE, "count", 99).unwrap();
        store.set_str(NAMESPACE, "device_0", "only").unwrap();
        let creds = CredentialStore::load(&store);
        assert_eq!(creds.len(), MAX_DEVICES);
        assert_eq!(creds.get(0).unwrap().name, "only");
        assert_eq!(creds.get(1).unwrap().name, "");
    }

    #[test]
    fn test_export_lines() {
        let mut store = MemoryStore::new();
        let mut creds = CredentialStore::default();
        creds.update_from_csv(&mut store, "a,1,b,2").unwrap();
        assert_eq!(creds.export_lines(), vec!["a,1", "b,2"]);
        assert_eq!(creds.names(), vec!["a", "b"]);
    }
}
