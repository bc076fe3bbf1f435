use crate::config::StageOptions;
use crate::config::stage::MarkupOptions;
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::keys::{ASSETS, REPORT, STAGE};
use crate::pipeline::nodes::basic::transform_contents;
use crate::pipeline::{PipeMap, PipeNode};
use async_trait::async_trait;
use minify_html::Cfg;
use regex::bytes::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;
use tracing::warn;

static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

/// HTML minifier node
pub struct HtmlMinifierNode;

#[async_trait]
impl PipeNode for HtmlMinifierNode {
    fn name(&self) -> String {
        "HtmlMinifier".to_string()
    }

    fn input(&self) -> Vec<String> {
        vec![
            STAGE.name().to_string(),
            ASSETS.name().to_string(),
            REPORT.name().to_string(),
        ]
    }

    fn output(&self) -> Vec<String> {
        vec![ASSETS.name().to_string()]
    }

    async fn process(&self, mut data: PipeMap) -> PipelineResult<PipeMap> {
        let name = self.name();
        let options = match &data.require(STAGE, &name)?.options {
            StageOptions::Markup(options) => options.clone(),
            other => {
                return Err(PipelineError::config(format!(
                    "{name} needs markup options, got {other:?}"
                )));
            }
        };
        if !options.collapse_whitespace && (options.minify_css || options.minify_js) {
            warn!(
                "Inline CSS and JS are only minified while collapsing whitespace, \
                 leaving them as written"
            );
        }
        let assets = data.take_required(ASSETS, &name)?;
        let report = data.require_mut(REPORT, &name)?;

        let minified = transform_contents(assets, report, |asset| {
            Ok(minify(&asset.contents, &options))
        });

        data.insert_typed(ASSETS, minified);
        Ok(data)
    }
}

/// Minify one document.
///
/// minify-html always collapses whitespace, so with collapsing disabled the
/// document is left as written apart from comment removal.
pub fn minify(html: &[u8], options: &MarkupOptions) -> Vec<u8> {
    if options.collapse_whitespace {
        minify_html::minify(html, &html_cfg(options))
    } else if options.remove_comments {
        strip_comments(html).into_owned()
    } else {
        html.to_vec()
    }
}

/// Remove comments, keeping IE conditional comments (`<!--[if ...]>`)
fn strip_comments(html: &[u8]) -> Cow<'_, [u8]> {
    COMMENT.replace_all(html, |caps: &Captures| {
        let comment = &caps[0];
        if comment.starts_with(b"<!--[") {
            comment.to_vec()
        } else {
            Vec::new()
        }
    })
}

/// minify-html has no mode that shrinks whitespace runs to a single space
/// without ever removing them. `conservative_collapse` instead keeps
/// optional tags, the doctype and attribute quoting, the closest
/// conservative setting it offers.
fn html_cfg(options: &MarkupOptions) -> Cfg {
    let mut cfg = Cfg::new();
    cfg.keep_comments = !options.remove_comments;
    cfg.minify_css = options.minify_css;
    cfg.minify_js = options.minify_js;

    if options.conservative_collapse {
        // Leave optional tags and quoting in place
        cfg.keep_closing_tags = true;
        cfg.keep_html_and_head_opening_tags = true;
        cfg.do_not_minify_doctype = true;
        cfg.ensure_spec_compliant_unquoted_attribute_values = true;
    }
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> MarkupOptions {
        MarkupOptions {
            collapse_whitespace: true,
            conservative_collapse: true,
            remove_comments: true,
            minify_css: true,
            minify_js: true,
        }
    }

    const PAGE: &str = "<!DOCTYPE html>\n<html>\n  <head>\n    <title>Home</title>\n  </head>\n  <body>\n    <!-- nav -->\n    <p>Hello   world</p>\n  </body>\n</html>\n";

    #[test]
    fn test_collapses_and_strips_comments() {
        let out = String::from_utf8(minify(PAGE.as_bytes(), &options())).unwrap();

        assert!(out.len() < PAGE.len());
        assert!(!out.contains("<!-- nav -->"));
        assert!(out.contains("<html>"));
        assert!(out.contains("</p>"));
        assert!(out.contains("Hello world"));
    }

    #[test]
    fn test_comments_can_be_kept() {
        let options = MarkupOptions {
            remove_comments: false,
            ..options()
        };
        let out = String::from_utf8(minify(PAGE.as_bytes(), &options)).unwrap();
        assert!(out.contains("<!-- nav -->"));
    }

    #[test]
    fn test_without_collapse_only_comments_go() {
        let options = MarkupOptions {
            collapse_whitespace: false,
            ..options()
        };
        let out = String::from_utf8(minify(PAGE.as_bytes(), &options)).unwrap();
        assert!(!out.contains("nav"));
        assert!(out.contains("<p>Hello   world</p>"));
        assert!(out.contains("  <head>\n    <title>"));
        assert_eq!(out, PAGE.replace("<!-- nav -->", ""));
    }

    #[test]
    fn test_without_collapse_or_comment_removal_is_unchanged() {
        let options = MarkupOptions {
            collapse_whitespace: false,
            remove_comments: false,
            ..options()
        };
        assert_eq!(minify(PAGE.as_bytes(), &options), PAGE.as_bytes());
    }

    #[test]
    fn test_conditional_comments_survive_stripping() {
        let page = b"<!--[if IE]><p>old</p><![endif]--><!-- note\n spans lines --><p>new</p>";
        let out = strip_comments(page);
        assert_eq!(
            out.as_ref(),
            b"<!--[if IE]><p>old</p><![endif]--><p>new</p>".as_slice()
        );
    }
}
