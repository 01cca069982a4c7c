use url::form_urlencoded;

/// Immutable description of one API call: a path and ordered query parameters.
///
/// Parameters are kept as an ordered list rather than a map. Repeated names
/// are legal and serialize in insertion order (`a=1&a=2&a=3`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestDescriptor {
    path: String,
    params: Vec<(String, String)>,
    response_shape: Option<String>,
}

impl RequestDescriptor {
    /// Creates a descriptor for `path` with no parameters.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: Vec::new(),
            response_shape: None,
        }
    }

    /// Appends a query parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Appends every pair from `pairs`, in iteration order.
    pub fn params<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Tags the descriptor with a response-shape name, used in diagnostics.
    pub fn with_response_shape(mut self, shape: impl Into<String>) -> Self {
        self.response_shape = Some(shape.into());
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn response_shape(&self) -> Option<&str> {
        self.response_shape.as_deref()
    }

    /// Returns `true` if at least one parameter named `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.params.iter().any(|(k, _)| k == name)
    }

    /// Returns the first value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Form-encodes the parameters in insertion order.
    pub fn query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (name, value) in &self.params {
            serializer.append_pair(name, value);
        }
        serializer.finish()
    }

    /// Returns `path?query`, or just the path when there are no parameters.
    pub fn path_and_query(&self) -> String {
        if self.params.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::RequestDescriptor;

    #[test]
    fn repeated_names_keep_insertion_order() {
        let descriptor = RequestDescriptor::new("/")
            .param("a", "1")
            .param("a", "2")
            .param("a", "3");
        assert_eq!(descriptor.query_string(), "a=1&a=2&a=3");
    }

    #[test]
    fn values_are_form_encoded() {
        let descriptor =
            RequestDescriptor::new("/maps/api/place/textsearch/json").param("query", "pizza & beer");
        assert_eq!(
            descriptor.path_and_query(),
            "/maps/api/place/textsearch/json?query=pizza+%26+beer"
        );
    }

    #[test]
    fn path_without_params_has_no_question_mark() {
        assert_eq!(RequestDescriptor::new("/x").path_and_query(), "/x");
    }

    #[test]
    fn lookup_helpers() {
        let descriptor = RequestDescriptor::new("/").params([("k", "v"), ("k", "w")]);
        assert!(descriptor.contains("k"));
        assert!(!descriptor.contains("missing"));
        assert_eq!(descriptor.get("k"), Some("v"));
        assert_eq!(descriptor.query_pairs().len(), 2);
    }
}
