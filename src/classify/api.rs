//! API style detection from repository layout.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::scan::Inventory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiStyle {
    Rest,
    Graphql,
    Grpc,
    Websocket,
    Mixed,
    None,
}

impl ApiStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiStyle::Rest => "REST",
            ApiStyle::Graphql => "GraphQL",
            ApiStyle::Grpc => "gRPC",
            ApiStyle::Websocket => "WebSocket",
            ApiStyle::Mixed => "mixed",
            ApiStyle::None => "none",
        }
    }
}

impl std::fmt::Display for ApiStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn glob_set(patterns: &[&str]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        if let Ok(glob) = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .literal_separator(true)
            .build()
        {
            builder.add(glob);
        }
    }
    builder.build().unwrap_or_else(|_| GlobSet::empty())
}

static LAYOUT_PATTERNS: Lazy<Vec<(ApiStyle, GlobSet)>> = Lazy::new(|| {
    vec![
        (
            ApiStyle::Rest,
            glob_set(&[
                "**/openapi*.{json,yaml,yml}",
                "**/swagger*.{json,yaml,yml}",
                "**/routes/**",
                "**/routers/**",
                "**/controllers/**",
                "**/endpoints/**",
                "**/*controller.*",
                "**/*routes.*",
                "**/views.py",
            ]),
        ),
        (
            ApiStyle::Graphql,
            glob_set(&["**/*.graphql", "**/*.gql", "**/resolvers/**", "**/*resolver.*"]),
        ),
        (ApiStyle::Grpc, glob_set(&["**/*.proto"])),
        (
            ApiStyle::Websocket,
            glob_set(&["**/*websocket*", "**/*socket.{js,ts,py,go}", "**/ws/**"]),
        ),
    ]
});

/// Decide the API style from layout matches and framework hints.
///
/// Returns the style and one evidence line per contributing signal.
pub(super) fn detect(inventory: &Inventory, hints: &[(ApiStyle, String)]) -> (ApiStyle, Vec<String>) {
    let mut found: BTreeSet<ApiStyle> = BTreeSet::new();
    let mut evidence = Vec::new();

    for (style, set) in LAYOUT_PATTERNS.iter() {
        if let Some(file) = inventory.files.iter().find(|f| set.is_match(&f.path)) {
            found.insert(*style);
            evidence.push(format!("{}: {}", style, file.path));
        }
    }
    for (style, reason) in hints {
        found.insert(*style);
        evidence.push(format!("{}: {}", style, reason));
    }

    let style = match found.len() {
        0 => ApiStyle::None,
        1 => found.into_iter().next().unwrap_or(ApiStyle::None),
        _ => ApiStyle::Mixed,
    };
    (style, evidence)
}
