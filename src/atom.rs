//! X11 atoms - interned property and protocol names

use std::collections::HashMap;

/// Atoms the toolkit needs on every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownAtom {
    WmProtocols,
    WmDeleteWindow,
    WmTakeFocus,
    NetWmSyncRequest,
    NetWmSyncRequestCounter,
    NetWmBypassCompositor,
    NetWmName,
    NetWmPid,
    Utf8String,
}

impl KnownAtom {
    pub const ALL: [KnownAtom; 9] = [
        Self::WmProtocols,
        Self::WmDeleteWindow,
        Self::WmTakeFocus,
        Self::NetWmSyncRequest,
        Self::NetWmSyncRequestCounter,
        Self::NetWmBypassCompositor,
        Self::NetWmName,
        Self::NetWmPid,
        Self::Utf8String,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::WmProtocols => "WM_PROTOCOLS",
            Self::WmDeleteWindow => "WM_DELETE_WINDOW",
            Self::WmTakeFocus => "WM_TAKE_FOCUS",
            Self::NetWmSyncRequest => "_NET_WM_SYNC_REQUEST",
            Self::NetWmSyncRequestCounter => "_NET_WM_SYNC_REQUEST_COUNTER",
            Self::NetWmBypassCompositor => "_NET_WM_BYPASS_COMPOSITOR",
            Self::NetWmName => "_NET_WM_NAME",
            Self::NetWmPid => "_NET_WM_PID",
            Self::Utf8String => "UTF8_STRING",
        }
    }
}

/// Client-side cache of atom ids, both directions.
///
/// The server is only asked once per name; `intern_with` takes the lookup
/// so the table stays independent of the connection.
#[derive(Debug)]
pub struct AtomTable {
    by_name: HashMap<String, u32>,
    by_id: HashMap<u32, String>,
}

impl Default for AtomTable {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomTable {
    pub fn new() -> Self {
        let mut table = Self {
            by_name: HashMap::new(),
            by_id: HashMap::new(),
        };

        // predefined atoms (X11/Xatom.h) the toolkit touches
        let predefined = [
            (1, "PRIMARY"),
            (2, "SECONDARY"),
            (4, "ATOM"),
            (6, "CARDINAL"),
            (19, "INTEGER"),
            (31, "STRING"),
            (33, "WINDOW"),
            (37, "WM_ICON_NAME"),
            (39, "WM_NAME"),
            (40, "WM_NORMAL_HINTS"),
            (67, "WM_CLASS"),
            (68, "WM_TRANSIENT_FOR"),
        ];
        for (id, name) in predefined {
            table.insert(name, id);
        }

        table
    }

    pub fn insert(&mut self, name: &str, id: u32) {
        self.by_name.insert(name.to_string(), id);
        self.by_id.insert(id, name.to_string());
    }

    /// Cached id for `name`, resolving and caching it on a miss.
    pub fn intern_with<E>(
        &mut self,
        name: &str,
        resolve: impl FnOnce(&str) -> Result<u32, E>,
    ) -> Result<u32, E> {
        if let Some(&id) = self.by_name.get(name) {
            return Ok(id);
        }
        let id = resolve(name)?;
        self.insert(name, id);
        Ok(id)
    }

    pub fn get_id(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    pub fn get_name(&self, id: u32) -> Option<&str> {
        self.by_id.get(&id).map(|s| s.as_str())
    }

    /// Id of a known atom, 0 (None) when it was never interned.
    pub fn known(&self, atom: KnownAtom) -> u32 {
        self.get_id(atom.name()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predefined_atoms() {
        let table = AtomTable::new();
        assert_eq!(table.get_id("WM_NAME"), Some(39));
        assert_eq!(table.get_name(67), Some("WM_CLASS"));
    }

    #[test]
    fn test_intern_resolves_once() {
        let mut table = AtomTable::new();
        let mut calls = 0;
        for _ in 0..3 {
            let id = table
                .intern_with("WM_PROTOCOLS", |_| {
                    calls += 1;
                    Ok::<_, ()>(301)
                })
                .unwrap();
            assert_eq!(id, 301);
        }
        assert_eq!(calls, 1);
        assert_eq!(table.known(KnownAtom::WmProtocols), 301);
        assert_eq!(table.get_name(301), Some("WM_PROTOCOLS"));
    }

    #[test]
    fn test_intern_error_is_not_cached() {
        let mut table = AtomTable::new();
        let result = table.intern_with("_NET_WM_PID", |_| Err("gone"));
        assert_eq!(result, Err("gone"));
        assert_eq!(table.known(KnownAtom::NetWmPid), 0);
    }
}
