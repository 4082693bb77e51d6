//! Reverse routing: turning a route and some data back into an absolute URL.

use url::form_urlencoded;

use super::route::Route;

/// Build `base_url + template`, substituting placeholders from `data`.
///
/// Keys naming a placeholder of `route` replace every `{key}` in the template
/// (percent-encoded); all other keys are appended as a form-encoded query
/// string, in the order given. Placeholders without data stay literal.
pub(crate) fn build<I, K, V>(base_url: &str, route: &Route, data: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: ToString,
{
    let mut path = route.template().to_owned();
    let mut query = form_urlencoded::Serializer::new(String::new());
    let mut has_query = false;

    for (key, value) in data {
        let key = key.as_ref();
        let value = value.to_string();
        if route.placeholders().iter().any(|name| name == key) {
            path = path.replace(&format!("{{{key}}}"), &urlencoding::encode(&value));
        } else {
            query.append_pair(key, &value);
            has_query = true;
        }
    }

    let mut url = String::with_capacity(base_url.len() + path.len());
    url.push_str(base_url);
    url.push_str(&path);
    if has_query {
        url.push('?');
        url.push_str(&query.finish());
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Method;
    use crate::router::{Handler, Pattern};

    const BASE: &str = "http://localhost:8040/router/examples";

    fn route(template: &str) -> Route {
        Route {
            method: Method::Get,
            template: template.to_owned(),
            pattern: Pattern::compile(template).unwrap(),
            name: Some("r".to_owned()),
            handler: Handler::from("Web:home"),
            middlewares: Vec::new(),
        }
    }

    #[test]
    fn placeholder_is_substituted() {
        let url = build(BASE, &route("/items/{id}"), [("id", 7)]);
        assert_eq!(url, format!("{BASE}/items/7"));
    }

    #[test]
    fn extra_keys_become_query() {
        let url = build(
            BASE,
            &route("/items/{id}"),
            [("id", "7"), ("sort", "desc"), ("q", "a b&c")],
        );
        assert_eq!(url, format!("{BASE}/items/7?sort=desc&q=a+b%26c"));
    }

    #[test]
    fn substituted_values_are_percent_encoded() {
        let url = build(BASE, &route("/search/{term}"), [("term", "rust/async")]);
        assert_eq!(url, format!("{BASE}/search/rust%2Fasync"));
    }

    #[test]
    fn key_merely_contained_in_template_goes_to_query() {
        let url = build(BASE, &route("/video/{vid}"), [("vid", "9"), ("id", "3")]);
        assert_eq!(url, format!("{BASE}/video/9?id=3"));
    }

    #[test]
    fn no_data_keeps_template() {
        let url = build(BASE, &route("/ops/{errcode}"), Vec::<(&str, &str)>::new());
        assert_eq!(url, format!("{BASE}/ops/{{errcode}}"));
    }
}
