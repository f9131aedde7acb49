// self
use crate::{
	_prelude::*,
	provider::{ProviderDescriptor, ProviderEndpoints},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ProviderDescriptorError {
	/// Authorization endpoint is required to build consent URLs.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// Token endpoint is required for exchanges and refreshes.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// API base is required for every data request.
	#[error("Missing API base URL.")]
	MissingApiBase,
	/// Endpoints must use HTTPS outside loopback hosts.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
}

/// Builder for [`ProviderDescriptor`] values.
#[derive(Debug, Default)]
pub struct ProviderDescriptorBuilder {
	authorization_endpoint: Option<Url>,
	token_endpoint: Option<Url>,
	api_base: Option<Url>,
}
impl ProviderDescriptorBuilder {
	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the API base URL; a trailing slash is appended when missing so relative paths
	/// join beneath it.
	pub fn api_base(mut self, mut url: Url) -> Self {
		if !url.path().ends_with('/') {
			let path = format!("{}/", url.path());

			url.set_path(&path);
		}

		self.api_base = Some(url);

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		let authorization = self
			.authorization_endpoint
			.ok_or(ProviderDescriptorError::MissingAuthorizationEndpoint)?;
		let token = self.token_endpoint.ok_or(ProviderDescriptorError::MissingTokenEndpoint)?;
		let api_base = self.api_base.ok_or(ProviderDescriptorError::MissingApiBase)?;

		validate_endpoint("authorization", &authorization)?;
		validate_endpoint("token", &token)?;
		validate_endpoint("api", &api_base)?;

		Ok(ProviderDescriptor { endpoints: ProviderEndpoints { authorization, token, api_base } })
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ProviderDescriptorError> {
	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ => Err(ProviderDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain == "localhost",
		Some(url::Host::Ipv4(addr)) => addr.is_loopback(),
		Some(url::Host::Ipv6(addr)) => addr.is_loopback(),
		None => false,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Fixture URL should parse.")
	}

	#[test]
	fn rejects_plain_http_outside_loopback() {
		let err = ProviderDescriptor::builder()
			.authorization_endpoint(url("http://accounts.example.com/authorize"))
			.token_endpoint(url("https://accounts.example.com/token"))
			.api_base(url("https://api.example.com/v1"))
			.build()
			.expect_err("Plain HTTP endpoints on public hosts must be rejected.");

		assert!(matches!(
			err,
			ProviderDescriptorError::InsecureEndpoint { endpoint: "authorization", .. }
		));
	}

	#[test]
	fn accepts_loopback_and_normalizes_api_base() {
		let descriptor = ProviderDescriptor::builder()
			.authorization_endpoint(url("http://127.0.0.1:8080/authorize"))
			.token_endpoint(url("http://localhost:8080/token"))
			.api_base(url("http://127.0.0.1:8080/v1"))
			.build()
			.expect("Loopback endpoints should be accepted.");

		assert_eq!(descriptor.endpoints.api_base.as_str(), "http://127.0.0.1:8080/v1/");
	}

	#[test]
	fn reports_missing_endpoints() {
		assert_eq!(
			ProviderDescriptor::builder().build(),
			Err(ProviderDescriptorError::MissingAuthorizationEndpoint)
		);
		assert_eq!(
			ProviderDescriptor::builder()
				.authorization_endpoint(url("https://a.example.com/authorize"))
				.token_endpoint(url("https://a.example.com/token"))
				.build(),
			Err(ProviderDescriptorError::MissingApiBase)
		);
	}
}
