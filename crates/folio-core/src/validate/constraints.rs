//! Constraint checking: a pure function from a defaulted body to the list of
//! every violated rule.
//!
//! Checks never stop at the first failure; the caller reports all of them
//! together.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::errors::{Rule, Violation};
use crate::ports::{BUCKET_NAME_PATTERN, REGION_PATTERN, has_dot_segment, is_bucket_name, is_region};
use crate::request::{Dimension, OutputFormat};
use crate::units;

static FILE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.+\.(pdf|html)$").expect("file name pattern is valid"));

const FILE_NAME_PATTERN: &str = r"^.+\.(pdf|html)$";

/// Schemes a `url` may use.
const URL_SCHEMES: [&str; 2] = ["http", "https"];

/// Check every constraint on an already-defaulted request body.
pub fn check_constraints(body: &Value) -> Vec<Violation> {
    let mut checker = Checker::default();
    let Some(root) = body.as_object() else {
        checker.type_error("body", "an object");
        return checker.violations;
    };

    checker.file_name(root);
    checker.content_source(root);
    checker.output(root);
    checker.cookies(root);
    checker.destination(root);
    checker.viewport(root);
    checker.options(root);
    checker.violations
}

#[derive(Default)]
struct Checker {
    violations: Vec<Violation>,
}

impl Checker {
    fn push(&mut self, path: impl Into<String>, rule: Rule) {
        self.violations.push(Violation::new(path, rule));
    }

    fn pattern(&mut self, path: &str, pattern: &str) {
        self.push(
            path,
            Rule::Pattern {
                pattern: pattern.to_string(),
            },
        );
    }

    fn type_error(&mut self, path: impl Into<String>, expected: &str) {
        self.push(
            path,
            Rule::Type {
                expected: expected.to_string(),
            },
        );
    }

    // ── typed accessors ─────────────────────────────────────────────

    fn string<'a>(&mut self, obj: &'a Map<String, Value>, key: &str, path: &str) -> Option<&'a str> {
        match obj.get(key)? {
            Value::String(s) => Some(s.as_str()),
            _ => {
                self.type_error(path, "a string");
                None
            }
        }
    }

    fn boolean(&mut self, obj: &Map<String, Value>, key: &str, path: &str) {
        if obj.get(key).is_some_and(|v| !v.is_boolean()) {
            self.type_error(path, "a boolean");
        }
    }

    fn number(&mut self, obj: &Map<String, Value>, key: &str, path: &str) -> Option<f64> {
        match obj.get(key)? {
            Value::Number(n) => n.as_f64(),
            _ => {
                self.type_error(path, "a number");
                None
            }
        }
    }

    fn object<'a>(
        &mut self,
        obj: &'a Map<String, Value>,
        key: &str,
        path: &str,
    ) -> Option<&'a Map<String, Value>> {
        match obj.get(key)? {
            Value::Object(map) => Some(map),
            _ => {
                self.type_error(path, "an object");
                None
            }
        }
    }

    fn dimension(&mut self, obj: &Map<String, Value>, key: &str, path: &str) {
        let Some(value) = obj.get(key) else { return };
        let dimension = match value {
            Value::Number(n) => Dimension::Number(n.as_f64().unwrap_or_default()),
            Value::String(s) => Dimension::Text(s.clone()),
            _ => {
                self.type_error(path, "a number or a string");
                return;
            }
        };
        if units::to_inches(&dimension).is_none() {
            self.push(path, Rule::Unit);
        }
    }

    // ── field rules ─────────────────────────────────────────────────

    fn file_name(&mut self, root: &Map<String, Value>) {
        if !root.contains_key("fileName") {
            self.push("fileName", Rule::Required);
            return;
        }
        if let Some(name) = self.string(root, "fileName", "fileName") {
            if !FILE_NAME.is_match(name) {
                self.pattern("fileName", FILE_NAME_PATTERN);
            } else if has_dot_segment(name) {
                self.push("fileName", Rule::DotSegment);
            }
        }
    }

    /// `url` empty or absent ⇒ `html` required and non-empty; otherwise `url`
    /// must be an absolute http(s) URI.
    fn content_source(&mut self, root: &Map<String, Value>) {
        let target = self.string(root, "url", "url");
        let html = self.string(root, "html", "html");
        let url_present = root.contains_key("url");

        match target {
            Some(target) if !target.is_empty() => {
                match url::Url::parse(target) {
                    Err(_) => self.push("url", Rule::Uri),
                    Ok(parsed) if !URL_SCHEMES.contains(&parsed.scheme()) => self.push(
                        "url",
                        Rule::Scheme {
                            allowed: URL_SCHEMES.iter().map(ToString::to_string).collect(),
                        },
                    ),
                    Ok(_) => {}
                }
            }
            // A wrong-typed url was already reported; don't pile on.
            None if url_present => {}
            _ => match html {
                Some(html) if !html.is_empty() => {}
                Some(_) => self.push("html", Rule::NonEmpty),
                None if root.contains_key("html") => {}
                None => self.push("html", Rule::Required),
            },
        }
    }

    fn output(&mut self, root: &Map<String, Value>) {
        if let Some(output) = self.string(root, "output", "output") {
            if !OutputFormat::ALL.contains(&output) {
                self.push(
                    "output",
                    Rule::OneOf {
                        allowed: OutputFormat::ALL.iter().map(ToString::to_string).collect(),
                    },
                );
            }
        }
    }

    fn cookies(&mut self, root: &Map<String, Value>) {
        let Some(value) = root.get("cookies") else { return };
        let Some(items) = value.as_array() else {
            self.type_error("cookies", "an array");
            return;
        };
        for (i, item) in items.iter().enumerate() {
            let path = format!("cookies[{i}]");
            let Some(cookie) = item.as_object() else {
                self.type_error(path, "an object");
                continue;
            };
            for key in ["name", "value"] {
                if !cookie.contains_key(key) {
                    self.push(format!("{path}.{key}"), Rule::Required);
                }
            }
            for key in ["name", "value", "domain", "url", "path", "sameSite"] {
                let _ = self.string(cookie, key, &format!("{path}.{key}"));
            }
            for key in ["secure", "httpOnly"] {
                self.boolean(cookie, key, &format!("{path}.{key}"));
            }
            let _ = self.number(cookie, "expires", &format!("{path}.expires"));
            let scoped = ["domain", "url"]
                .iter()
                .any(|k| cookie.get(*k).and_then(Value::as_str).is_some_and(|s| !s.is_empty()));
            if !scoped {
                self.push(path, Rule::CookieScope);
            }
        }
    }

    fn destination(&mut self, root: &Map<String, Value>) {
        let Some(bucket) = self.object(root, "s3Bucket", "s3Bucket") else {
            return;
        };
        match self.string(bucket, "name", "s3Bucket.name") {
            Some("") => self.push("s3Bucket.name", Rule::NonEmpty),
            Some(name) if !is_bucket_name(name) => self.pattern("s3Bucket.name", BUCKET_NAME_PATTERN),
            Some(_) => {}
            None if bucket.contains_key("name") => {}
            None => self.push("s3Bucket.name", Rule::Required),
        }
        match self.string(bucket, "region", "s3Bucket.region") {
            Some("") => self.push("s3Bucket.region", Rule::NonEmpty),
            Some(region) if !is_region(region) => self.pattern("s3Bucket.region", REGION_PATTERN),
            _ => {}
        }
        if let Some(creds) = self.object(bucket, "credentials", "s3Bucket.credentials") {
            for key in ["awsAccessKeyId", "awsSecretAccessKey"] {
                let _ = self.string(creds, key, &format!("s3Bucket.credentials.{key}"));
            }
        }
    }

    fn viewport(&mut self, root: &Map<String, Value>) {
        let Some(viewport) = self.object(root, "defaultViewport", "defaultViewport") else {
            return;
        };
        for key in ["width", "height"] {
            let path = format!("defaultViewport.{key}");
            if let Some(n) = self.number(viewport, key, &path) {
                if n < 1.0 {
                    self.push(path, Rule::Positive);
                }
            }
        }
    }

    fn options(&mut self, root: &Map<String, Value>) {
        let Some(options) = self.object(root, "options", "options") else {
            return;
        };
        for key in [
            "displayHeaderFooter",
            "printBackground",
            "landscape",
            "preferCSSPageSize",
        ] {
            self.boolean(options, key, &format!("options.{key}"));
        }
        for key in ["headerTemplate", "footerTemplate", "pageRanges"] {
            let _ = self.string(options, key, &format!("options.{key}"));
        }
        if let Some(format) = self.string(options, "format", "options.format") {
            if !format.is_empty() && units::paper_size(format).is_none() {
                self.push(
                    "options.format",
                    Rule::OneOf {
                        allowed: units::paper_format_names(),
                    },
                );
            }
        }
        for key in ["width", "height"] {
            self.dimension(options, key, &format!("options.{key}"));
        }
        if let Some(scale) = self.number(options, "scale", "options.scale") {
            if !(0.1..=2.0).contains(&scale) {
                self.push(
                    "options.scale",
                    Rule::Range {
                        min: "0.1".into(),
                        max: "2".into(),
                    },
                );
            }
        }
        if let Some(margin) = self.object(options, "margin", "options.margin") {
            for side in ["top", "right", "bottom", "left"] {
                self.dimension(margin, side, &format!("options.margin.{side}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::defaults::apply_defaults;
    use serde_json::json;

    fn check(body: Value) -> Vec<Violation> {
        check_constraints(&apply_defaults(&body))
    }

    fn paths(violations: &[Violation]) -> Vec<&str> {
        violations.iter().map(|v| v.path.as_str()).collect()
    }

    fn valid() -> Value {
        json!({
            "fileName": "report.pdf",
            "url": "https://example.com",
            "s3Bucket": { "name": "bucket1" }
        })
    }

    #[test]
    fn minimal_request_passes() {
        assert!(check(valid()).is_empty());
    }

    #[test]
    fn non_object_body_fails() {
        let v = check(json!("hello"));
        assert_eq!(paths(&v), ["body"]);
    }

    #[test]
    fn file_name_extensions() {
        for (name, ok) in [
            ("report.pdf", true),
            ("report.html", true),
            ("report.txt", false),
            (".pdf", false),
            ("report.pdfx", false),
        ] {
            let mut body = valid();
            body["fileName"] = json!(name);
            assert_eq!(check(body).is_empty(), ok, "{name}");
        }
    }

    #[test]
    fn file_name_required() {
        let mut body = valid();
        let _ = body.as_object_mut().unwrap().remove("fileName");
        let v = check(body);
        assert_eq!(v, [Violation::new("fileName", Rule::Required)]);
    }

    #[test]
    fn html_required_without_url() {
        let v = check(json!({ "fileName": "a.pdf", "s3Bucket": { "name": "bucket1" } }));
        assert_eq!(v, [Violation::new("html", Rule::Required)]);
    }

    #[test]
    fn html_required_with_empty_url() {
        let v = check(json!({ "fileName": "a.pdf", "url": "", "s3Bucket": { "name": "bucket1" } }));
        assert_eq!(v, [Violation::new("html", Rule::Required)]);
    }

    #[test]
    fn empty_html_rejected() {
        let v = check(json!({ "fileName": "a.pdf", "html": "", "s3Bucket": { "name": "bucket1" } }));
        assert_eq!(v, [Violation::new("html", Rule::NonEmpty)]);
    }

    #[test]
    fn html_alone_passes() {
        let v = check(json!({ "fileName": "a.html", "html": "<p>hi</p>", "s3Bucket": { "name": "bucket1" } }));
        assert!(v.is_empty());
    }

    #[test]
    fn malformed_url_rejected() {
        let mut body = valid();
        body["url"] = json!("not a url");
        assert_eq!(check(body), [Violation::new("url", Rule::Uri)]);
    }

    #[test]
    fn non_web_url_schemes_rejected() {
        for target in ["file:///proc/self/environ", "chrome://settings", "data:text/html,hi"] {
            let mut body = valid();
            body["url"] = json!(target);
            let v = check(body);
            assert_eq!(paths(&v), ["url"], "{target}");
            assert!(matches!(v[0].rule, Rule::Scheme { .. }), "{target}");
        }
        let mut body = valid();
        body["url"] = json!("http://example.com/page");
        assert!(check(body).is_empty());
    }

    #[test]
    fn file_name_dot_segments_rejected() {
        for name in ["../x.pdf", "reports/../x.pdf", "./x.pdf"] {
            let mut body = valid();
            body["fileName"] = json!(name);
            assert_eq!(check(body), [Violation::new("fileName", Rule::DotSegment)], "{name}");
        }
        let mut body = valid();
        body["fileName"] = json!("reports/2024/x.pdf");
        assert!(check(body).is_empty());
    }

    #[test]
    fn bucket_name_must_be_dns_compatible() {
        for name in ["attacker.example#", "Bucket1", "b", "a..b", "x@attacker.example/"] {
            let mut body = valid();
            body["s3Bucket"]["name"] = json!(name);
            assert_eq!(
                check(body),
                [Violation::new(
                    "s3Bucket.name",
                    Rule::Pattern {
                        pattern: BUCKET_NAME_PATTERN.into()
                    }
                )],
                "{name}"
            );
        }
    }

    #[test]
    fn region_must_be_plain_code() {
        for region in ["x@attacker.example/", "eu-west-3.evil.com", "eu west 3"] {
            let mut body = valid();
            body["s3Bucket"]["region"] = json!(region);
            assert_eq!(
                check(body),
                [Violation::new(
                    "s3Bucket.region",
                    Rule::Pattern {
                        pattern: REGION_PATTERN.into()
                    }
                )],
                "{region}"
            );
        }
        let mut body = valid();
        body["s3Bucket"]["region"] = json!("us-west-2");
        assert!(check(body).is_empty());
    }

    #[test]
    fn bucket_name_required() {
        let v = check(json!({ "fileName": "a.pdf", "url": "https://example.com" }));
        assert_eq!(v, [Violation::new("s3Bucket.name", Rule::Required)]);
    }

    #[test]
    fn every_violation_is_collected() {
        let v = check(json!({
            "fileName": "a.txt",
            "output": "PNG",
            "defaultViewport": { "width": "wide" }
        }));
        assert_eq!(
            paths(&v),
            ["fileName", "html", "output", "s3Bucket.name", "defaultViewport.width"]
        );
    }

    #[test]
    fn wrong_types_are_reported() {
        let mut body = valid();
        body["fileName"] = json!(42);
        body["cookies"] = json!({});
        body["options"] = json!({ "landscape": "yes" });
        let v = check(body);
        assert_eq!(paths(&v), ["fileName", "cookies", "options.landscape"]);
    }

    #[test]
    fn cookie_rules() {
        let mut body = valid();
        body["cookies"] = json!([
            { "name": "a", "value": "1", "domain": "example.com" },
            { "name": "b", "value": "2" },
            { "value": "3", "url": "https://example.com" }
        ]);
        let v = check(body);
        assert_eq!(
            v,
            [
                Violation::new("cookies[1]", Rule::CookieScope),
                Violation::new("cookies[2].name", Rule::Required),
            ]
        );
    }

    #[test]
    fn unknown_paper_format_rejected() {
        let mut body = valid();
        body["options"] = json!({ "format": "Napkin" });
        assert_eq!(paths(&check(body)), ["options.format"]);
    }

    #[test]
    fn margin_units_checked() {
        let mut body = valid();
        body["options"] = json!({ "margin": { "top": "1cm", "left": 10, "right": "2em" } });
        assert_eq!(
            check(body),
            [Violation::new("options.margin.right", Rule::Unit)]
        );
    }

    #[test]
    fn scale_range_checked() {
        let mut body = valid();
        body["options"] = json!({ "scale": 3 });
        assert_eq!(paths(&check(body)), ["options.scale"]);
    }

    #[test]
    fn zero_viewport_rejected() {
        let mut body = valid();
        body["defaultViewport"] = json!({ "width": 0 });
        assert_eq!(
            check(body),
            [Violation::new("defaultViewport.width", Rule::Positive)]
        );
    }
}
