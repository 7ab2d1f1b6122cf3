//! Wire route table.
//!
//! Every spec exposed to wire routes gets one `(verb, path)` pair:
//!
//! | Target | Verb | Path |
//! |--------|------|------|
//! | `create` | `POST` | `/{resource}` |
//! | `read` | `GET` | `/{resource}/{item_id}` |
//! | `update` | `PATCH` | `/{resource}/{item_id}` |
//! | `replace` | `PUT` | `/{resource}/{item_id}` |
//! | `merge` | `PATCH` | `/{resource}/{item_id}/merge` |
//! | `delete` | `DELETE` | `/{resource}/{item_id}` |
//! | `list` | `GET` | `/{resource}` |
//! | `clear` | `DELETE` | `/{resource}` |
//! | `bulk_*` | as the single form | `/{resource}/bulk` (`bulk_merge`: `/bulk/merge`) |
//! | `custom` | `POST` | `/{resource}[/{item_id}]/{alias}` |
//!
//! The member placeholder follows the spec's arity, not its target, and both
//! the prefix and the placeholder name come from [`RouteConfig`]. The table
//! is always rebuilt in full.

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeMap;

use opchain_core::RouteConfig;
use opchain_spec::{Arity, OpKey, OperationSpec, Target};

/// HTTP verb of a wire route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HttpVerb {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl HttpVerb {
    /// Returns the default verb for `target`.
    #[must_use]
    pub const fn for_target(target: Target) -> Self {
        match target {
            Target::Read | Target::List => HttpVerb::Get,
            Target::Create | Target::BulkCreate | Target::Custom => HttpVerb::Post,
            Target::Replace | Target::BulkReplace => HttpVerb::Put,
            Target::Update | Target::Merge | Target::BulkUpdate | Target::BulkMerge => {
                HttpVerb::Patch
            }
            Target::Delete | Target::Clear | Target::BulkDelete => HttpVerb::Delete,
        }
    }

    /// Returns the upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unsupported verb.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported HTTP verb '{0}'")]
pub struct UnknownVerb(pub String);

impl FromStr for HttpVerb {
    type Err = UnknownVerb;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpVerb::Get),
            "POST" => Ok(HttpVerb::Post),
            "PUT" => Ok(HttpVerb::Put),
            "PATCH" => Ok(HttpVerb::Patch),
            "DELETE" => Ok(HttpVerb::Delete),
            _ => Err(UnknownVerb(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// One wire route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    verb: HttpVerb,
    path: String,
    segments: Vec<Segment>,
    resource: String,
    key: OpKey,
    arity: Arity,
    status: u16,
}

impl Route {
    fn for_spec(resource: &str, spec: &OperationSpec, config: &RouteConfig) -> Self {
        let target = spec.target();
        let mut segments = vec![Segment::Literal(resource.to_string())];
        if spec.arity() == Arity::Member {
            segments.push(Segment::Param(config.member_param().to_string()));
        }
        if target.is_bulk() {
            segments.push(Segment::Literal("bulk".to_string()));
        }
        match target {
            Target::Merge | Target::BulkMerge => segments.push(Segment::Literal("merge".to_string())),
            Target::Custom => segments.push(Segment::Literal(spec.alias().to_string())),
            _ => {}
        }

        let mut path = config.prefix().to_string();
        for segment in &segments {
            match segment {
                Segment::Literal(text) => {
                    path.push('/');
                    path.push_str(text);
                }
                Segment::Param(name) => {
                    path.push_str("/{");
                    path.push_str(name);
                    path.push('}');
                }
            }
        }
        let prefix = config
            .prefix()
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| Segment::Literal(s.to_string()));
        let segments = prefix.chain(segments).collect();

        let status = if target == Target::Create && spec.arity() == Arity::Collection {
            201
        } else {
            200
        };

        Self {
            verb: HttpVerb::for_target(target),
            path,
            segments,
            resource: resource.to_string(),
            key: spec.key(),
            arity: spec.arity(),
            status,
        }
    }

    /// Returns the verb.
    #[must_use]
    pub fn verb(&self) -> HttpVerb {
        self.verb
    }

    /// Returns the path template, e.g. `/api/widget/{item_id}`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the operation key served by this route.
    #[must_use]
    pub fn key(&self) -> &OpKey {
        &self.key
    }

    /// Returns the success status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    fn matches(&self, parts: &[&str]) -> Option<BTreeMap<String, String>> {
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut params = BTreeMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(text) if text == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), (*part).to_string());
                }
            }
        }
        Some(params)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb, self.path)
    }
}

/// Result of a successful [`RouteTable::lookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// Owning resource.
    pub resource: String,
    /// Operation key.
    pub key: OpKey,
    /// Arity of the operation.
    pub arity: Arity,
    /// Success status code.
    pub status: u16,
    /// Identifiers extracted from the path.
    pub path_params: BTreeMap<String, String>,
}

/// Path + verb lookup for one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Builds the table for `specs`.
    ///
    /// Returns the table and a description of each route dropped because an
    /// earlier spec already claimed its verb and path.
    #[must_use]
    pub fn build(
        resource: &str,
        specs: &[OperationSpec],
        config: &RouteConfig,
    ) -> (Self, Vec<String>) {
        let mut routes: Vec<Route> = Vec::new();
        let mut conflicts = Vec::new();

        for spec in specs.iter().filter(|s| s.exposure().wire_route) {
            let route = Route::for_spec(resource, spec, config);
            if let Some(existing) = routes
                .iter()
                .find(|r| r.verb == route.verb && r.segments == route.segments)
            {
                conflicts.push(format!(
                    "{route} for {} already serves {}",
                    route.key, existing.key
                ));
                continue;
            }
            routes.push(route);
        }

        (Self { routes }, conflicts)
    }

    /// Finds the route for `verb` and a concrete `path`.
    ///
    /// When several routes match, the one with the most literal segments
    /// wins.
    #[must_use]
    pub fn lookup(&self, verb: HttpVerb, path: &str) -> Option<RouteMatch> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        self.routes
            .iter()
            .filter(|r| r.verb == verb)
            .filter_map(|r| r.matches(&parts).map(|params| (r, params)))
            .max_by_key(|(r, _)| r.literal_count())
            .map(|(route, path_params)| RouteMatch {
                resource: route.resource.clone(),
                key: route.key.clone(),
                arity: route.arity,
                status: route.status,
                path_params,
            })
    }

    /// Returns every route in resolution order.
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Returns the number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
