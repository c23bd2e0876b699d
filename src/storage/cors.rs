//! Container CORS policy

/// Cross-origin settings stored as container metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorsPolicy {
    /// Allowed origins; `*` allows any
    pub allow_origins: Vec<String>,
    pub max_age: Option<u64>,
    pub expose_headers: Vec<String>,
}

impl CorsPolicy {
    pub fn allow<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allow_origins: origins.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn expose<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expose_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    /// Container metadata headers carrying this policy
    pub fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![(
            "X-Container-Meta-Access-Control-Allow-Origin".to_string(),
            self.allow_origins.join(" "),
        )];
        if let Some(max_age) = self.max_age {
            headers.push((
                "X-Container-Meta-Access-Control-Max-Age".to_string(),
                max_age.to_string(),
            ));
        }
        if !self.expose_headers.is_empty() {
            headers.push((
                "X-Container-Meta-Access-Control-Expose-Headers".to_string(),
                self.expose_headers.join(" "),
            ));
        }
        headers
    }

    /// Whether the service should echo `origin` in
    /// `Access-Control-Allow-Origin`
    pub fn allows(&self, origin: &str) -> bool {
        self.allow_origins
            .iter()
            .any(|allowed| allowed == "*" || allowed == origin)
    }
}
