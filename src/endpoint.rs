//! Resource paths and server roots.
//!
//! [`Endpoint`] values are normalized once at construction so every later URL build is a
//! plain concatenation against a [`RootUrl`]. Normalization strips a leading
//! `scheme://host[:port]` (plus any site path before the kind's prefix), collapses repeated
//! `rest/services` / `admin` / `sharing` segments into a single leading prefix, and drops
//! empty segments. A query string or fragment is carried over verbatim. Normalizing a
//! normalized path is a no-op.

// self
use crate::{_prelude::*, error::ConfigError};

/// Root used by [`EndpointKind::Online`] endpoints regardless of the gateway root.
pub const ONLINE_ROOT: &str = "https://www.arcgis.com/";

/// Errors produced while normalizing endpoint paths.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum EndpointError {
	/// Server/Admin endpoints need a non-empty path.
	#[error("The {kind} endpoint path cannot be empty.")]
	Empty {
		/// Endpoint kind label.
		kind: &'static str,
	},
}

/// Resource families understood by the gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EndpointKind {
	/// Catalog and service resources under `rest/services/`.
	Server,
	/// Administrative resources under `admin/`.
	Admin,
	/// Hosted platform resources under `sharing/`, resolved against [`ONLINE_ROOT`].
	Online,
	/// Caller-supplied absolute URL, used verbatim.
	Absolute,
}
impl EndpointKind {
	/// Returns a stable label suitable for logs and errors.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Server => "server",
			Self::Admin => "admin",
			Self::Online => "online",
			Self::Absolute => "absolute",
		}
	}

	/// Returns the fixed relative-URL prefix (with trailing slash) for the kind.
	pub const fn prefix(self) -> &'static str {
		match self {
			Self::Server => "rest/services/",
			Self::Admin => "admin/",
			Self::Online => "sharing/",
			Self::Absolute => "",
		}
	}

	const fn prefix_segments(self) -> &'static [&'static str] {
		match self {
			Self::Server => &["rest", "services"],
			Self::Admin => &["admin"],
			Self::Online => &["sharing"],
			Self::Absolute => &[],
		}
	}
}
impl Display for EndpointKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Immutable, normalized resource path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
	relative_url: String,
	kind: EndpointKind,
}
impl Endpoint {
	/// Normalizes `raw` for the given kind.
	pub fn new(raw: &str, kind: EndpointKind) -> Result<Self, EndpointError> {
		Ok(Self { relative_url: normalize(raw, kind)?, kind })
	}

	/// Catalog/service endpoint under `rest/services/`.
	pub fn server(raw: &str) -> Result<Self, EndpointError> {
		Self::new(raw, EndpointKind::Server)
	}

	/// Administrative endpoint under `admin/`.
	pub fn admin(raw: &str) -> Result<Self, EndpointError> {
		Self::new(raw, EndpointKind::Admin)
	}

	/// Hosted platform endpoint under `sharing/`; accepts an empty path.
	pub fn online(raw: &str) -> Self {
		let kind = EndpointKind::Online;

		Self { relative_url: normalize_segments(raw, kind), kind }
	}

	/// Absolute URL stored verbatim.
	pub fn absolute(url: impl Into<String>) -> Self {
		Self { relative_url: url.into(), kind: EndpointKind::Absolute }
	}

	/// Normalized relative URL (the verbatim URL for absolute endpoints).
	pub fn relative_url(&self) -> &str {
		&self.relative_url
	}

	/// Endpoint kind.
	pub fn kind(&self) -> EndpointKind {
		self.kind
	}

	/// Combines the endpoint with `root`; absolute and online endpoints ignore `root`.
	pub fn build_absolute_url(&self, root: &RootUrl) -> String {
		match self.kind {
			EndpointKind::Absolute => self.relative_url.clone(),
			EndpointKind::Online => format!("{ONLINE_ROOT}{}", self.relative_url),
			EndpointKind::Server | EndpointKind::Admin => root.join(&self.relative_url),
		}
	}
}
impl Display for Endpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.relative_url)
	}
}

/// Normalizes a raw path for `kind`.
///
/// Absolute paths are returned unchanged. Server and Admin paths must not be empty or
/// whitespace-only; a `/`-only path normalizes to the bare prefix.
pub fn normalize(raw: &str, kind: EndpointKind) -> Result<String, EndpointError> {
	match kind {
		EndpointKind::Absolute => Ok(raw.to_owned()),
		EndpointKind::Server | EndpointKind::Admin if raw.trim().is_empty() =>
			Err(EndpointError::Empty { kind: kind.as_str() }),
		_ => Ok(normalize_segments(raw, kind)),
	}
}

fn normalize_segments(raw: &str, kind: EndpointKind) -> String {
	let prefix = kind.prefix_segments();
	let (path, query) = split_query(strip_authority(raw.trim()));
	let segments = path.split('/').filter(|segment| !segment.is_empty()).collect::<Vec<_>>();
	// Anything before the first prefix occurrence is the site path of a full URL.
	let start = find_prefix(&segments, prefix).unwrap_or(0);
	let mut rest = segments[start..].to_vec();

	while let Some(idx) = find_prefix(&rest, prefix) {
		rest.drain(idx..idx + prefix.len());
	}

	format!("{}{}{query}", kind.prefix(), rest.join("/"))
}

fn split_query(raw: &str) -> (&str, &str) {
	raw.find(['?', '#']).map(|idx| raw.split_at(idx)).unwrap_or((raw, ""))
}

fn strip_authority(raw: &str) -> &str {
	let Some(scheme_end) = raw.find("://") else {
		return raw;
	};

	// Only a leading scheme counts; `://` inside a path or query is data.
	if raw[..scheme_end].contains(['/', '?', '#']) {
		return raw;
	}

	let after_scheme = &raw[scheme_end + 3..];

	after_scheme.find('/').map(|idx| &after_scheme[idx..]).unwrap_or("")
}

fn find_prefix(segments: &[&str], prefix: &[&str]) -> Option<usize> {
	(0..segments.len()).find(|&idx| starts_with_prefix(&segments[idx..], prefix))
}

fn starts_with_prefix(segments: &[&str], prefix: &[&str]) -> bool {
	!prefix.is_empty()
		&& segments.len() >= prefix.len()
		&& segments
			.iter()
			.zip(prefix)
			.all(|(segment, expected)| segment.eq_ignore_ascii_case(expected))
}

/// Normalized server root in the form `scheme://host[:port]/site/`.
///
/// Always ends with `/`; any `rest/services` or `admin` segment (and everything after it)
/// is stripped so service URLs can be passed directly.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RootUrl(Url);
impl RootUrl {
	/// Parses and normalizes a root URL.
	pub fn parse(raw: &str) -> Result<Self, ConfigError> {
		let raw = raw.trim();

		if raw.is_empty() {
			return Err(ConfigError::MissingRootUrl);
		}

		let mut url = Url::parse(raw).map_err(|err| ConfigError::InvalidRootUrl {
			url: raw.to_owned(),
			reason: err.to_string(),
		})?;

		if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
			return Err(ConfigError::InvalidRootUrl {
				url: raw.to_owned(),
				reason: "expected an http(s) URL with a host".into(),
			});
		}

		let segments = url
			.path_segments()
			.map(|segments| segments.filter(|segment| !segment.is_empty()).collect::<Vec<_>>())
			.unwrap_or_default();
		let cut = (0..segments.len())
			.find(|&idx| {
				starts_with_prefix(&segments[idx..], EndpointKind::Server.prefix_segments())
					|| starts_with_prefix(&segments[idx..], EndpointKind::Admin.prefix_segments())
			})
			.unwrap_or(segments.len());
		let site = segments[..cut].iter().map(|segment| format!("{segment}/")).collect::<String>();

		url.set_path(&format!("/{site}"));
		url.set_query(None);
		url.set_fragment(None);

		Ok(Self(url))
	}

	/// Root as a string, always ending with `/`.
	pub fn as_str(&self) -> &str {
		self.0.as_str()
	}

	/// Root as a parsed URL.
	pub fn as_url(&self) -> &Url {
		&self.0
	}

	/// Appends a relative path (without leading slash) to the root.
	pub fn join(&self, relative: &str) -> String {
		format!("{}{}", self.as_str(), relative.trim_start_matches('/'))
	}
}
impl AsRef<str> for RootUrl {
	fn as_ref(&self) -> &str {
		self.as_str()
	}
}
impl Debug for RootUrl {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "RootUrl({})", self.as_str())
	}
}
impl Display for RootUrl {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const SAMPLES: &[&str] = &[
		"/",
		"rest/services/rest/rest/services/services",
		"Census/MapServer",
		"/rest/services/Census/MapServer/3/",
		"rest/services/rest/services/Census/MapServer",
		"REST/Services/Census/MapServer",
		"https://host.example.com:6443/arcgis/rest/services/Census/MapServer/0/query?where=1=1",
		"arcgis/rest/services/Utilities/Geometry/GeometryServer",
		"admin/services",
		"//double//slashes//",
		"Census/MapServer/0/query?callbackUrl=https://app.example.com/rest/services/cb",
	];

	#[test]
	fn every_kind_keeps_its_prefix_and_is_idempotent() {
		for kind in [EndpointKind::Server, EndpointKind::Admin, EndpointKind::Online] {
			for raw in SAMPLES {
				let once = normalize(raw, kind).expect("Sample paths should normalize.");
				let twice = normalize(&once, kind).expect("Normalized paths should renormalize.");

				assert!(once.starts_with(kind.prefix()), "{once} lacks the {kind} prefix.");
				assert_eq!(once, twice, "Normalization of `{raw}` must be idempotent.");
			}
		}
	}

	#[test]
	fn server_paths_collapse_duplicates_and_strip_hosts() {
		let endpoint = Endpoint::server("rest/services/rest/services/Census/MapServer")
			.expect("Duplicated prefixes should normalize.");

		assert_eq!(endpoint.relative_url(), "rest/services/Census/MapServer");

		let endpoint =
			Endpoint::server("https://host.example.com/arcgis/rest/services/Census/MapServer/")
				.expect("Full URLs should normalize.");

		assert_eq!(endpoint.relative_url(), "rest/services/Census/MapServer");
		assert_eq!(
			Endpoint::server("/").map(|e| e.relative_url().to_owned()),
			Ok("rest/services/".into())
		);
		assert_eq!(
			Endpoint::server("Census/MapServer").map(|e| e.relative_url().to_owned()),
			Ok("rest/services/Census/MapServer".into())
		);
	}

	#[test]
	fn query_strings_are_kept_verbatim() {
		let endpoint = Endpoint::server(
			"Census/MapServer/0/query?where=1%3D1&callbackUrl=https://app.example.com/cb",
		)
		.expect("Paths with URL-valued parameters should normalize.");

		assert_eq!(
			endpoint.relative_url(),
			"rest/services/Census/MapServer/0/query?where=1%3D1&callbackUrl=https://app.example.com/cb"
		);

		let endpoint = Endpoint::server(
			"https://host.example.com/arcgis/rest/services/Census/MapServer/?next=/rest/services/x",
		)
		.expect("Full URLs with queries should normalize.");

		assert_eq!(endpoint.relative_url(), "rest/services/Census/MapServer?next=/rest/services/x");
		assert_eq!(
			Endpoint::admin("machines#top").map(|e| e.relative_url().to_owned()),
			Ok("admin/machines#top".into())
		);
	}

	#[test]
	fn admin_paths_collapse_duplicates() {
		let endpoint =
			Endpoint::admin("/admin/admin/machines/").expect("Admin path should normalize.");

		assert_eq!(endpoint.relative_url(), "admin/machines");
		assert_eq!(Endpoint::admin("/").map(|e| e.relative_url().to_owned()), Ok("admin/".into()));
	}

	#[test]
	fn empty_server_and_admin_paths_are_rejected() {
		assert_eq!(Endpoint::server(""), Err(EndpointError::Empty { kind: "server" }));
		assert_eq!(Endpoint::admin("   "), Err(EndpointError::Empty { kind: "admin" }));
		assert_eq!(Endpoint::online("").relative_url(), "sharing/");
	}

	#[test]
	fn absolute_endpoints_ignore_the_root() {
		let root = RootUrl::parse("https://gis.example.com/arcgis").expect("Root should parse.");
		let endpoint = Endpoint::absolute("https://other.example.com/custom/path?x=1");

		assert_eq!(endpoint.build_absolute_url(&root), "https://other.example.com/custom/path?x=1");
		assert_eq!(endpoint.kind(), EndpointKind::Absolute);
	}

	#[test]
	fn relative_endpoints_build_against_the_root() {
		let root = RootUrl::parse("https://gis.example.com/arcgis/").expect("Root should parse.");
		let server = Endpoint::server("Census/MapServer").expect("Server path should normalize.");
		let admin = Endpoint::admin("machines").expect("Admin path should normalize.");
		let online = Endpoint::online("oauth2/token");

		assert_eq!(
			server.build_absolute_url(&root),
			"https://gis.example.com/arcgis/rest/services/Census/MapServer"
		);
		assert_eq!(admin.build_absolute_url(&root), "https://gis.example.com/arcgis/admin/machines");
		assert_eq!(online.build_absolute_url(&root), "https://www.arcgis.com/sharing/oauth2/token");
	}

	#[test]
	fn root_urls_are_normalized() {
		let cases = [
			("https://gis.example.com/arcgis", "https://gis.example.com/arcgis/"),
			("https://gis.example.com/arcgis/rest/services/", "https://gis.example.com/arcgis/"),
			("https://gis.example.com/arcgis/admin", "https://gis.example.com/arcgis/"),
			(
				"http://gis.example.com:6080/arcgis/rest/services/Census/MapServer?f=json",
				"http://gis.example.com:6080/arcgis/",
			),
			("https://gis.example.com", "https://gis.example.com/"),
		];

		for (raw, expected) in cases {
			let root = RootUrl::parse(raw).expect("Root fixtures should parse.");

			assert_eq!(root.as_str(), expected, "Unexpected normalization for `{raw}`.");
		}
	}

	#[test]
	fn root_urls_reject_missing_or_malformed_input() {
		assert!(matches!(RootUrl::parse("  "), Err(ConfigError::MissingRootUrl)));
		assert!(matches!(RootUrl::parse("not a url"), Err(ConfigError::InvalidRootUrl { .. })));
		assert!(matches!(
			RootUrl::parse("ftp://gis.example.com/arcgis"),
			Err(ConfigError::InvalidRootUrl { .. })
		));
	}
}
