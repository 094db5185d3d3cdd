//! Framework, database and auth detection.
//!
//! Import targets and manifest tokens are matched against a static table.
//! A marker matches a name that equals it or that continues it with a
//! separator (`fastapi` matches `fastapi.responses`, not `fastapi_utils`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ApiStyle;

/// What a detected technology is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TechCategory {
    Framework,
    Database,
    Auth,
}

impl std::fmt::Display for TechCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TechCategory::Framework => "framework",
            TechCategory::Database => "database",
            TechCategory::Auth => "auth",
        };
        write!(f, "{}", s)
    }
}

pub(super) struct Technology {
    pub name: &'static str,
    pub category: TechCategory,
    /// API style implied by using it.
    pub api: Option<ApiStyle>,
    pub markers: &'static [&'static str],
}

pub(super) const TECHNOLOGIES: &[Technology] = &[
    Technology {
        name: "FastAPI",
        category: TechCategory::Framework,
        api: Some(ApiStyle::Rest),
        markers: &["fastapi"],
    },
    Technology {
        name: "Flask",
        category: TechCategory::Framework,
        api: Some(ApiStyle::Rest),
        markers: &["flask"],
    },
    Technology {
        name: "Django",
        category: TechCategory::Framework,
        api: Some(ApiStyle::Rest),
        markers: &["django", "rest_framework", "djangorestframework"],
    },
    Technology {
        name: "Express",
        category: TechCategory::Framework,
        api: Some(ApiStyle::Rest),
        markers: &["express"],
    },
    Technology {
        name: "NestJS",
        category: TechCategory::Framework,
        api: Some(ApiStyle::Rest),
        markers: &["@nestjs/core", "@nestjs/common"],
    },
    Technology {
        name: "Spring Boot",
        category: TechCategory::Framework,
        api: Some(ApiStyle::Rest),
        markers: &[
            "org.springframework.boot",
            "org.springframework.web",
            "spring-boot-starter-web",
            "spring-boot-starter-webflux",
        ],
    },
    Technology {
        name: "Gin",
        category: TechCategory::Framework,
        api: Some(ApiStyle::Rest),
        markers: &["github.com/gin-gonic/gin"],
    },
    Technology {
        name: "Actix Web",
        category: TechCategory::Framework,
        api: Some(ApiStyle::Rest),
        markers: &["actix-web", "actix_web"],
    },
    Technology {
        name: "Axum",
        category: TechCategory::Framework,
        api: Some(ApiStyle::Rest),
        markers: &["axum"],
    },
    Technology {
        name: "Rails",
        category: TechCategory::Framework,
        api: Some(ApiStyle::Rest),
        markers: &["rails", "railties"],
    },
    Technology {
        name: "Apollo/GraphQL",
        category: TechCategory::Framework,
        api: Some(ApiStyle::Graphql),
        markers: &[
            "@apollo/server",
            "apollo-server",
            "graphql",
            "graphene",
            "strawberry",
            "async-graphql",
            "async_graphql",
            "juniper",
        ],
    },
    Technology {
        name: "gRPC",
        category: TechCategory::Framework,
        api: Some(ApiStyle::Grpc),
        markers: &[
            "grpc",
            "grpcio",
            "@grpc/grpc-js",
            "google.golang.org/grpc",
            "io.grpc",
            "tonic",
        ],
    },
    Technology {
        name: "WebSockets",
        category: TechCategory::Framework,
        api: Some(ApiStyle::Websocket),
        markers: &[
            "socket.io",
            "websockets",
            "tokio-tungstenite",
            "github.com/gorilla/websocket",
        ],
    },
    Technology {
        name: "PostgreSQL",
        category: TechCategory::Database,
        api: None,
        markers: &[
            "psycopg2",
            "psycopg2-binary",
            "psycopg",
            "asyncpg",
            "pg",
            "org.postgresql",
            "github.com/lib/pq",
            "github.com/jackc/pgx",
            "tokio-postgres",
        ],
    },
    Technology {
        name: "MySQL",
        category: TechCategory::Database,
        api: None,
        markers: &["mysql", "mysql2", "pymysql", "mysqlclient", "github.com/go-sql-driver/mysql"],
    },
    Technology {
        name: "SQLite",
        category: TechCategory::Database,
        api: None,
        markers: &["sqlite3", "rusqlite", "better-sqlite3"],
    },
    Technology {
        name: "MongoDB",
        category: TechCategory::Database,
        api: None,
        markers: &["pymongo", "motor", "mongoose", "mongodb", "go.mongodb.org/mongo-driver"],
    },
    Technology {
        name: "Redis",
        category: TechCategory::Database,
        api: None,
        markers: &["redis", "ioredis", "aioredis", "github.com/go-redis/redis", "github.com/redis/go-redis"],
    },
    Technology {
        name: "SQLAlchemy",
        category: TechCategory::Database,
        api: None,
        markers: &["sqlalchemy", "flask_sqlalchemy", "flask-sqlalchemy"],
    },
    Technology {
        name: "JWT",
        category: TechCategory::Auth,
        api: None,
        markers: &[
            "jwt",
            "pyjwt",
            "jose",
            "python-jose",
            "jsonwebtoken",
            "io.jsonwebtoken",
            "github.com/golang-jwt/jwt",
        ],
    },
    Technology {
        name: "OAuth",
        category: TechCategory::Auth,
        api: None,
        markers: &["authlib", "oauthlib", "oauth2", "passport-oauth2", "golang.org/x/oauth2"],
    },
    Technology {
        name: "Passport",
        category: TechCategory::Auth,
        api: None,
        markers: &["passport", "passport-jwt", "passport-local"],
    },
    Technology {
        name: "Spring Security",
        category: TechCategory::Auth,
        api: None,
        markers: &["org.springframework.security", "spring-boot-starter-security"],
    },
];

/// A technology with the evidence that detected it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedTechnology {
    pub name: String,
    pub category: TechCategory,
    pub evidence: Vec<String>,
}

/// Whether `name` is `marker` or `marker` followed by a separator.
pub(super) fn marker_matches(marker: &str, name: &str) -> bool {
    match name.strip_prefix(marker) {
        Some("") => true,
        Some(rest) => rest.starts_with(|c: char| matches!(c, '.' | '/' | ':')),
        None => false,
    }
}

/// Split manifest text into candidate package names.
pub(super) fn manifest_tokens(content: &str) -> impl Iterator<Item = String> + '_ {
    content
        .split(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '@')))
        .filter(|t| !t.is_empty())
        .map(|t| t.trim_end_matches('.').to_ascii_lowercase())
}

/// Accumulates evidence per technology, in table order.
#[derive(Default)]
pub(super) struct TechnologyMatcher {
    hits: BTreeMap<usize, Vec<String>>,
}

impl TechnologyMatcher {
    /// Record `name` (an import target or manifest token) seen at `location`.
    pub fn observe(&mut self, name: &str, location: &str) {
        for (i, tech) in TECHNOLOGIES.iter().enumerate() {
            if tech.markers.iter().any(|m| marker_matches(m, name)) {
                let evidence = self.hits.entry(i).or_default();
                let entry = format!("{} ({})", name, location);
                if !evidence.contains(&entry) && evidence.len() < 5 {
                    evidence.push(entry);
                }
            }
        }
    }

    /// Detected technologies plus the API styles they imply.
    pub fn finish(self) -> (Vec<DetectedTechnology>, Vec<(ApiStyle, String)>) {
        let mut detected = Vec::new();
        let mut hints = Vec::new();
        for (i, evidence) in self.hits {
            let tech = &TECHNOLOGIES[i];
            if let Some(style) = tech.api {
                hints.push((style, format!("uses {}", tech.name)));
            }
            detected.push(DetectedTechnology {
                name: tech.name.to_string(),
                category: tech.category,
                evidence,
            });
        }
        (detected, hints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_matching() {
        assert!(marker_matches("fastapi", "fastapi"));
        assert!(marker_matches("fastapi", "fastapi.responses"));
        assert!(marker_matches("django", "django.contrib.auth"));
        assert!(marker_matches("@nestjs/core", "@nestjs/core"));
        assert!(!marker_matches("fastapi", "fastapi_utils"));
        assert!(!marker_matches("pg", "pgvector"));
    }

    #[test]
    fn test_manifest_tokens() {
        let tokens: Vec<String> =
            manifest_tokens("{\"dependencies\": {\"express\": \"^4.18.2\", \"@nestjs/core\": \"10\"}}")
                .collect();
        assert!(tokens.contains(&"express".to_string()));
        assert!(tokens.contains(&"@nestjs/core".to_string()));

        let tokens: Vec<String> = manifest_tokens("FastAPI==0.110\nuvicorn[standard]\n").collect();
        assert!(tokens.contains(&"fastapi".to_string()));
    }

    #[test]
    fn test_matcher_orders_by_table() {
        let mut matcher = TechnologyMatcher::default();
        matcher.observe("sqlalchemy.orm", "app/db.py:1");
        matcher.observe("fastapi", "app/main.py:1");
        matcher.observe("fastapi", "app/main.py:1");
        let (detected, hints) = matcher.finish();
        let names: Vec<&str> = detected.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["FastAPI", "SQLAlchemy"]);
        assert_eq!(detected[0].evidence.len(), 1);
        assert_eq!(hints, vec![(ApiStyle::Rest, "uses FastAPI".to_string())]);
    }
}
