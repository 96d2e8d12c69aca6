//! Resource reference rewriting.
//!
//! Fragments reference their resources by climbing one level into a sibling
//! directory (`../images/x.png`, `url('../fonts/y.woff')`). Once fragments are
//! merged, those references have to resolve from the assembled output instead.
//! Each pass is a function `&str -> String`; references that do not follow the
//! climb-one-level convention are left alone, so every pass is idempotent.

use std::borrow::Cow;
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use bindery_shared::{BinderyError, Result};

/// `src="../dir/` / `href='../dir/` in markup.
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?P<lead>\s)(?P<attr>src|href)=(?P<q>["'])\.\./(?P<dir>[A-Za-z0-9_-][A-Za-z0-9_.-]*/)"#)
        .expect("valid regex")
});

/// `url(../dir/`, optionally quoted, in stylesheets or inline styles.
static CSS_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(?P<q>["']?)\.\./(?P<dir>[A-Za-z0-9_-][A-Za-z0-9_.-]*/)"#)
        .expect("valid regex")
});

/// `@import` of a local stylesheet (remote imports are kept).
static LOCAL_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@import\s+(?:url\(\s*)?["']?(?P<file>[^"')\s;:]+\.css)["']?\s*\)?[^;]*;"#)
        .expect("valid regex")
});

/// `marks: …` declarations (crop / cross registration marks).
static MARKS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?P<lead>^|[\s;{])marks\s*:[^;}]*;?").expect("valid regex")
});

/// `bleed: …` declarations.
static BLEED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?P<lead>^|[\s;{])bleed\s*:[^;}]*;?").expect("valid regex")
});

// ---------------------------------------------------------------------------
// Rewriter
// ---------------------------------------------------------------------------

/// Rewrites relative resource references for one assembly target.
#[derive(Debug, Clone)]
pub struct ResourceRewriter {
    target: Target,
}

#[derive(Debug, Clone)]
enum Target {
    /// Combined markup: references become `<base>/<dir>/…`.
    Absolute { base: String },
    /// Typesetting source: image inclusions become `<prefix><file>`.
    EngineRelative { graphics: Regex, prefix: String },
}

impl ResourceRewriter {
    /// Rewriter for combined markup consumed from an arbitrary working
    /// directory: references are anchored at `base_dir`.
    pub fn absolute(base_dir: &Path) -> Result<Self> {
        let base = base_dir.to_string_lossy().trim_end_matches('/').to_string();
        if base.is_empty() || base.starts_with("../") || base.starts_with("./") || base == ".." {
            return Err(BinderyError::validation(format!(
                "rewrite base must be an anchored path, got {:?}",
                base_dir.display().to_string()
            )));
        }
        Ok(Self {
            target: Target::Absolute { base },
        })
    }

    /// Rewriter for typesetting-engine source: `\includegraphics` references
    /// into `images_dir` are re-pointed at `prefix` (relative to the master
    /// document). References already under `prefix` are left alone.
    pub fn engine_relative(images_dir: &str, prefix: &str) -> Result<Self> {
        if prefix.starts_with("../") {
            return Err(BinderyError::validation(format!(
                "engine image prefix must not climb out of the output directory, got {prefix:?}"
            )));
        }
        let graphics = Regex::new(&format!(
            r"\\includegraphics(?P<opts>\[[^\]]*\])?\{{(?P<lead>\.\.?/)?(?P<path>{}/(?P<file>[^}}]*))\}}",
            regex::escape(images_dir.trim_matches('/'))
        ))
        .map_err(|e| BinderyError::validation(format!("invalid images directory: {e}")))?;

        Ok(Self {
            target: Target::EngineRelative {
                graphics,
                prefix: prefix.to_string(),
            },
        })
    }

    /// Apply every pass for this target.
    pub fn rewrite(&self, content: &str) -> String {
        match &self.target {
            Target::Absolute { base } => {
                let out = rewrite_attributes(content, base);
                rewrite_css_urls(&out, base).into_owned()
            }
            Target::EngineRelative { graphics, prefix } => {
                rewrite_graphics(content, graphics, prefix).into_owned()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Passes
// ---------------------------------------------------------------------------

/// `src="../images/a.png"` → `src="<base>/images/a.png"`.
fn rewrite_attributes<'a>(markup: &'a str, base: &str) -> Cow<'a, str> {
    ATTR_RE.replace_all(markup, |caps: &Captures| {
        format!(
            "{}{}={}{base}/{}",
            &caps["lead"], &caps["attr"], &caps["q"], &caps["dir"]
        )
    })
}

/// `url('../fonts/a.woff')` → `url('<base>/fonts/a.woff')`.
fn rewrite_css_urls<'a>(css: &'a str, base: &str) -> Cow<'a, str> {
    CSS_URL_RE.replace_all(css, |caps: &Captures| {
        format!("url({}{base}/{}", &caps["q"], &caps["dir"])
    })
}

/// `\includegraphics[w]{../images/a.svg}` → `\includegraphics[w]{<prefix>a}`.
///
/// Vector images are converted to PDF beside the original, so the `.svg`
/// extension is dropped and the engine picks the converted file.
fn rewrite_graphics<'a>(source: &'a str, graphics: &Regex, prefix: &str) -> Cow<'a, str> {
    graphics.replace_all(source, |caps: &Captures| {
        if caps.name("lead").is_none() && caps["path"].starts_with(prefix) {
            return caps[0].to_string();
        }
        let opts = caps.name("opts").map_or("", |m| m.as_str());
        let file = &caps["file"];
        let file = file.strip_suffix(".svg").unwrap_or(file);
        format!("\\includegraphics{opts}{{{prefix}{file}}}")
    })
}

/// Print-renderer policy for the print stylesheet layer.
///
/// * `@import`s of the layers named in `inlined` are dropped, since those
///   sheets are already in the document; other imports stay;
/// * crop / registration marks are switched off and bleed removed, since
///   print-on-demand services add their own.
pub fn prepare_print_stylesheet(css: &str, inlined: &[&str]) -> String {
    let css = LOCAL_IMPORT_RE.replace_all(css, |caps: &Captures| {
        let file = &caps["file"];
        let name = file.rsplit('/').next().unwrap_or(file);
        if inlined.contains(&name) {
            format!("/* {file} already inlined */")
        } else {
            caps[0].to_string()
        }
    });
    let css = MARKS_RE.replace_all(&css, "${lead}marks: none;");
    let css = BLEED_RE.replace_all(&css, "${lead}");

    debug!(len = css.len(), "print stylesheet prepared");
    css.into_owned()
}
