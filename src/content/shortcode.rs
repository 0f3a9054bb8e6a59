//! Shortcodes: `{{< name key="value" >}}` macros embedded in Markdown
//!
//! Shortcodes expand to single-line HTML before the Markdown pass, so the
//! output of a block shortcode becomes an HTML block and inline ones (`img`)
//! stay inside their paragraph. Text inside fenced code blocks, indented
//! code blocks and inline code spans is left alone, except that the escaped
//! form `{{</* name */>}}` always renders literally as `{{< name >}}`.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::assets::{is_external, resolve_reference, AssetRef};
use crate::helpers::{host_of, html_escape, url_for_root};

lazy_static! {
    static ref LIST_ITEM: Regex = Regex::new(r"^ {0,3}(?:[-+*]|\d{1,9}[.)])(?:\s|$)").unwrap();
    static ref BLANK_LINE: Regex = Regex::new(r"\n[ \t]*\n").unwrap();
}

/// Whether a shortcode takes inner content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Always self-closing
    None,
    /// Uses inner content when a closing tag follows
    Optional,
    /// Must be closed with `{{< /name >}}`
    Required,
}

/// Parsed shortcode arguments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    named: BTreeMap<String, String>,
    positional: Vec<String>,
}

impl Args {
    /// Parse `key="quoted value" key2=bare positional "quoted positional"`
    pub fn parse(input: &str) -> Result<Self, String> {
        let mut args = Args::default();
        let mut chars = input.chars().peekable();

        loop {
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }
            if chars.peek().is_none() {
                break;
            }

            let first = read_value(&mut chars)?;
            if chars.peek() == Some(&'=') {
                chars.next();
                if first.is_empty() {
                    return Err("argument with an empty name".to_string());
                }
                if chars.peek().map_or(true, |c| c.is_whitespace()) {
                    return Err(format!("argument `{}` has no value", first));
                }
                let value = read_value(&mut chars)?;
                args.named.insert(first, value);
            } else {
                args.positional.push(first);
            }
        }

        Ok(args)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.named.get(key).map(String::as_str)
    }

    pub fn positional(&self, index: usize) -> Option<&str> {
        self.positional.get(index).map(String::as_str)
    }

    /// Named argument, or the positional argument at `index`
    pub fn get_or_positional(&self, key: &str, index: usize) -> Option<&str> {
        self.get(key).or_else(|| self.positional(index))
    }

    pub fn required(&self, key: &str, index: usize) -> Result<&str, String> {
        self.get_or_positional(key, index)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| format!("missing required argument `{}`", key))
    }

    /// `autoplay`, `autoplay=true` and `autoplay="true"` are all set
    pub fn flag(&self, key: &str) -> bool {
        match self.get(key) {
            Some(v) => v == "true" || v == "yes" || v == "1",
            None => self.positional.iter().any(|p| p == key),
        }
    }
}

fn read_value(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<String, String> {
    let mut value = String::new();
    match chars.peek().copied() {
        Some(quote @ ('"' | '\'')) => {
            chars.next();
            loop {
                match chars.next() {
                    Some('\\') => match chars.next() {
                        Some(c) => value.push(c),
                        None => return Err("unterminated escape".to_string()),
                    },
                    Some(c) if c == quote => break,
                    Some(c) => value.push(c),
                    None => return Err(format!("unterminated {} quote", quote)),
                }
            }
        }
        _ => {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '=' {
                    break;
                }
                value.push(c);
                chars.next();
            }
        }
    }
    Ok(value)
}

/// One shortcode occurrence
#[derive(Debug)]
pub struct ShortcodeCall<'a> {
    pub name: &'a str,
    pub args: Args,
    pub body: Option<String>,
}

/// Per-document state shared by every shortcode in it
#[derive(Debug)]
pub struct ShortcodeContext<'a> {
    root: &'a str,
    page_path: &'a str,
    bundle: bool,
    assets: Vec<AssetRef>,
}

impl<'a> ShortcodeContext<'a> {
    /// `page_path` is the document's route relative to the site root;
    /// `bundle` means relative references resolve against that route.
    pub fn new(root: &'a str, page_path: &'a str, bundle: bool) -> Self {
        Self {
            root,
            page_path,
            bundle,
            assets: Vec::new(),
        }
    }

    /// Record a local reference and return the URL to emit for it.
    /// External references are returned unchanged.
    pub fn asset(&mut self, reference: &str, origin: &str) -> String {
        let reference = reference.trim();
        if is_external(reference) {
            return reference.to_string();
        }
        let target = resolve_reference(self.root, self.page_path, self.bundle, reference);
        let url = url_for_root(self.root, &target);
        self.assets.push(AssetRef {
            reference: reference.to_string(),
            target,
            origin: origin.to_string(),
        });
        url
    }

    /// URL for a link target. Internal targets are rooted but not recorded
    /// as assets; the link checker verifies them after rendering.
    pub fn link(&self, target: &str) -> String {
        let target = target.trim();
        if is_external(target) || !target.starts_with('/') {
            return target.to_string();
        }
        let split = target.find(['?', '#']).unwrap_or(target.len());
        let (path, suffix) = target.split_at(split);
        let resolved = resolve_reference(self.root, self.page_path, false, path);
        url_for_root(self.root, &resolved) + suffix
    }

    pub fn into_assets(self) -> Vec<AssetRef> {
        self.assets
    }
}

/// Why a shortcode could not be expanded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcodeError {
    pub name: String,
    pub message: String,
}

impl ShortcodeError {
    fn new(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

pub type RenderFn = fn(&ShortcodeCall<'_>, &mut ShortcodeContext<'_>) -> Result<String, String>;

struct Shortcode {
    body: BodyKind,
    render: RenderFn,
}

/// The set of shortcodes a site understands
pub struct ShortcodeRegistry {
    shortcodes: BTreeMap<String, Shortcode>,
}

impl ShortcodeRegistry {
    /// An empty registry
    pub fn empty() -> Self {
        Self {
            shortcodes: BTreeMap::new(),
        }
    }

    /// A registry with every built-in shortcode
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("img", BodyKind::None, render_img);
        registry.register("image", BodyKind::None, render_img);
        registry.register("figure", BodyKind::None, render_figure);
        registry.register("gallery", BodyKind::Required, render_gallery);
        registry.register("video", BodyKind::None, render_video);
        registry.register("youtube", BodyKind::None, render_youtube);
        registry.register("vimeo", BodyKind::None, render_vimeo);
        registry.register("preview", BodyKind::Optional, render_preview);
        registry
    }

    pub fn register(&mut self, name: &str, body: BodyKind, render: RenderFn) {
        self.shortcodes
            .insert(name.to_string(), Shortcode { body, render });
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.shortcodes.keys().map(String::as_str)
    }

    /// Expand every shortcode in a Markdown document
    pub fn expand(
        &self,
        markdown: &str,
        ctx: &mut ShortcodeContext<'_>,
    ) -> Result<String, ShortcodeError> {
        let mut output = String::with_capacity(markdown.len());
        for (fenced, segment) in split_fences(markdown) {
            if fenced {
                output.push_str(&unescape_literal(segment));
            } else {
                output.push_str(&self.expand_text(segment, ctx)?);
            }
        }
        Ok(output)
    }

    fn expand_text(
        &self,
        text: &str,
        ctx: &mut ShortcodeContext<'_>,
    ) -> Result<String, ShortcodeError> {
        let code = code_ranges(text);
        let mut output = String::new();
        let mut rest = text;

        while let Some(start) = next_open(text, text.len() - rest.len(), &code) {
            push_source(&mut output, text, text.len() - rest.len(), start, &code);
            let after_open = &text[start + 3..];

            if let Some(escaped) = after_open.strip_prefix("/*") {
                let end = escaped
                    .find("*/>}}")
                    .ok_or_else(|| ShortcodeError::new("", "unclosed escaped shortcode"))?;
                output.push_str("{{<");
                output.push_str(&escaped[..end]);
                output.push_str(">}}");
                rest = &escaped[end + 5..];
                continue;
            }

            let end = after_open
                .find(">}}")
                .ok_or_else(|| ShortcodeError::new("", "missing `>}}`"))?;
            let tag = after_open[..end].trim();
            rest = &after_open[end + 3..];

            let (name, arg_text) = match tag.find(char::is_whitespace) {
                Some(split) => (&tag[..split], &tag[split..]),
                None => (tag, ""),
            };
            if name.is_empty() {
                return Err(ShortcodeError::new("", "empty shortcode"));
            }
            if let Some(closing) = name.strip_prefix('/') {
                return Err(ShortcodeError::new(
                    closing.trim(),
                    "closing tag without an opening tag",
                ));
            }

            let shortcode = self
                .shortcodes
                .get(name)
                .ok_or_else(|| ShortcodeError::new(name, "unknown shortcode"))?;
            let args = Args::parse(arg_text).map_err(|e| ShortcodeError::new(name, e))?;

            let body = match shortcode.body {
                BodyKind::None => None,
                kind => match find_closing_tag(rest, name, kind == BodyKind::Optional) {
                    Some((inner, after_close)) => {
                        rest = after_close;
                        Some(self.expand_text(inner, ctx)?)
                    }
                    None if kind == BodyKind::Required => {
                        return Err(ShortcodeError::new(name, "missing closing tag"));
                    }
                    None => None,
                },
            };

            let call = ShortcodeCall { name, args, body };
            let html = (shortcode.render)(&call, ctx).map_err(|e| ShortcodeError::new(name, e))?;
            output.push_str(&html);
        }

        push_source(&mut output, text, text.len() - rest.len(), text.len(), &code);
        Ok(output)
    }
}

impl Default for ShortcodeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Find `{{< /name >}}`. With `before_next_open`, a closing tag that comes
/// after another opening of the same shortcode belongs to that one instead.
fn find_closing_tag<'t>(
    text: &'t str,
    name: &str,
    before_next_open: bool,
) -> Option<(&'t str, &'t str)> {
    let escaped = regex::escape(name);
    let close = Regex::new(&format!(r"\{{\{{<\s*/\s*{}\s*>\}}\}}", escaped)).ok()?;
    let found = close.find(text)?;

    if before_next_open {
        let open = Regex::new(&format!(r"\{{\{{<\s*{}(\s|>)", escaped)).ok()?;
        if open.find(text).is_some_and(|m| m.start() < found.start()) {
            return None;
        }
    }

    Some((&text[..found.start()], &text[found.end()..]))
}

/// Split Markdown into (fenced, text) segments along fenced code blocks
fn split_fences(markdown: &str) -> Vec<(bool, &str)> {
    let mut segments = Vec::new();
    let mut segment_start = 0;
    let mut offset = 0;
    let mut fence: Option<(char, usize)> = None;

    for line in markdown.split_inclusive('\n') {
        let indent = line.len() - line.trim_start_matches(' ').len();
        let trimmed = line.trim_start_matches(' ');
        let marker = trimmed.chars().next().filter(|c| *c == '`' || *c == '~');
        let run = marker.map_or(0, |m| trimmed.chars().take_while(|c| *c == m).count());

        match fence {
            None if indent < 4 && run >= 3 => {
                if offset > segment_start {
                    segments.push((false, &markdown[segment_start..offset]));
                }
                segment_start = offset;
                fence = marker.map(|m| (m, run));
            }
            Some((m, len))
                if marker == Some(m) && run >= len && trimmed[run..].trim().is_empty() =>
            {
                let end = offset + line.len();
                segments.push((true, &markdown[segment_start..end]));
                segment_start = end;
                fence = None;
            }
            _ => {}
        }
        offset += line.len();
    }

    if segment_start < markdown.len() {
        segments.push((fence.is_some(), &markdown[segment_start..]));
    }
    segments
}

/// Byte ranges of indented code blocks and inline code spans, sorted
fn code_ranges(text: &str) -> Vec<(usize, usize)> {
    let blocks = indented_blocks(text);
    let bytes = text.as_bytes();
    let mut ranges = blocks.clone();
    let mut i = 0;

    while i < bytes.len() {
        if let Some(&(_, end)) = blocks.iter().find(|(start, end)| *start <= i && i < *end) {
            i = end;
            continue;
        }
        if bytes[i] != b'`' || (i > 0 && bytes[i - 1] == b'\\') {
            i += 1;
            continue;
        }
        let run = bytes[i..].iter().take_while(|b| **b == b'`').count();
        // A span ends with its paragraph
        let paragraph_end = BLANK_LINE
            .find_at(text, i + run)
            .map_or(bytes.len(), |m| m.start());
        let limit = blocks
            .iter()
            .map(|(start, _)| *start)
            .filter(|start| *start > i)
            .fold(paragraph_end, usize::min);
        match closing_backticks(&bytes[i + run..limit], run) {
            Some(close) => {
                let end = i + run + close + run;
                ranges.push((i, end));
                i = end;
            }
            None => i += run,
        }
    }

    ranges.sort_unstable();
    ranges
}

/// Offset of the first run of exactly `len` backticks
fn closing_backticks(bytes: &[u8], len: usize) -> Option<usize> {
    let mut j = 0;
    while j < bytes.len() {
        if bytes[j] != b'`' {
            j += 1;
            continue;
        }
        let run = bytes[j..].iter().take_while(|b| **b == b'`').count();
        if run == len {
            return Some(j);
        }
        j += run;
    }
    None
}

/// Lines indented by four spaces or a tab that start after a blank line,
/// outside list items
fn indented_blocks(text: &str) -> Vec<(usize, usize)> {
    let mut blocks: Vec<(usize, usize)> = Vec::new();
    let mut offset = 0;
    let mut prev_blank = true;
    let mut prev_code = false;
    let mut in_list = false;

    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        let blank = content.trim().is_empty();
        let indented = content.starts_with('\t') || content.starts_with("    ");
        let code = !blank && indented && !in_list && (prev_blank || prev_code);

        if code {
            match blocks.last_mut() {
                Some((_, end)) if *end == offset => *end = offset + line.len(),
                _ => blocks.push((offset, offset + line.len())),
            }
        } else if !blank && !indented {
            in_list = LIST_ITEM.is_match(content);
        }
        if !blank {
            prev_code = code;
        }
        prev_blank = blank;
        offset += line.len();
    }
    blocks
}

fn next_open(text: &str, from: usize, code: &[(usize, usize)]) -> Option<usize> {
    text[from..]
        .match_indices("{{<")
        .map(|(i, _)| from + i)
        .find(|i| !code.iter().any(|(start, end)| start <= i && i < end))
}

/// Copy `text[from..to]`, showing escaped shortcodes inside code literally
fn push_source(output: &mut String, text: &str, from: usize, to: usize, code: &[(usize, usize)]) {
    let mut pos = from;
    for &(start, end) in code {
        if end <= pos || start >= to {
            continue;
        }
        let start = start.max(pos);
        let end = end.min(to);
        output.push_str(&text[pos..start]);
        output.push_str(&unescape_literal(&text[start..end]));
        pos = end;
    }
    output.push_str(&text[pos..to]);
}

fn unescape_literal(text: &str) -> String {
    text.replace("{{</*", "{{<").replace("*/>}}", ">}}")
}

// Built-in shortcodes. Every one emits a single line so the Markdown pass
// sees one HTML block (or one inline tag for `img`).

fn optional_attr(name: &str, value: Option<&str>) -> String {
    value
        .filter(|v| !v.is_empty())
        .map(|v| format!(r#" {}="{}""#, name, html_escape(v)))
        .unwrap_or_default()
}

fn render_img(call: &ShortcodeCall<'_>, ctx: &mut ShortcodeContext<'_>) -> Result<String, String> {
    let src = ctx.asset(call.args.required("src", 0)?, call.name);
    let alt = call.args.get_or_positional("alt", 1).unwrap_or_default();
    Ok(format!(
        r#"<img src="{}" alt="{}"{}{} loading="lazy">"#,
        html_escape(&src),
        html_escape(alt),
        optional_attr("title", call.args.get("title")),
        optional_attr("width", call.args.get("width")),
    ))
}

fn render_figure(
    call: &ShortcodeCall<'_>,
    ctx: &mut ShortcodeContext<'_>,
) -> Result<String, String> {
    let src = ctx.asset(call.args.required("src", 0)?, call.name);
    let caption = call.args.get("caption").unwrap_or_default();
    let title = call.args.get("title").unwrap_or_default();
    let alt = call
        .args
        .get("alt")
        .or(Some(caption).filter(|c| !c.is_empty()))
        .unwrap_or(title);

    let class = match call.args.get("class") {
        Some(extra) if !extra.is_empty() => format!("figure {}", extra),
        _ => "figure".to_string(),
    };

    let img = format!(
        r#"<img src="{}" alt="{}"{} loading="lazy">"#,
        html_escape(&src),
        html_escape(alt),
        optional_attr("width", call.args.get("width")),
    );
    let img = match call.args.get("link") {
        Some(link) if !link.is_empty() => {
            let href = ctx.link(link);
            format!(r#"<a href="{}">{}</a>"#, html_escape(&href), img)
        }
        _ => img,
    };

    let figcaption = match (title.is_empty(), caption.is_empty()) {
        (true, true) => String::new(),
        (false, true) => format!("<figcaption><strong>{}</strong></figcaption>", html_escape(title)),
        (true, false) => format!("<figcaption>{}</figcaption>", html_escape(caption)),
        (false, false) => format!(
            "<figcaption><strong>{}</strong> {}</figcaption>",
            html_escape(title),
            html_escape(caption)
        ),
    };

    Ok(format!(
        r#"<figure class="{}">{}{}</figure>"#,
        html_escape(&class),
        img,
        figcaption
    ))
}

fn render_gallery(
    call: &ShortcodeCall<'_>,
    ctx: &mut ShortcodeContext<'_>,
) -> Result<String, String> {
    let columns = match call.args.get("columns") {
        Some(c) => c
            .parse::<u8>()
            .ok()
            .filter(|c| (1..=12).contains(c))
            .ok_or_else(|| format!("invalid columns {:?}", c))?,
        None => 3,
    };

    let mut items = String::new();
    for line in call.body.as_deref().unwrap_or_default().lines() {
        let line = line.trim().trim_start_matches(['-', '*']).trim();
        if line.is_empty() {
            continue;
        }
        let (path, caption) = match line.split_once('|') {
            Some((path, caption)) => (path.trim(), caption.trim()),
            None => (line, ""),
        };
        let src = html_escape(&ctx.asset(path, call.name));
        let figcaption = if caption.is_empty() {
            String::new()
        } else {
            format!("<figcaption>{}</figcaption>", html_escape(caption))
        };
        items.push_str(&format!(
            r#"<figure class="gallery-item"><a href="{}"><img src="{}" alt="{}" loading="lazy"></a>{}</figure>"#,
            src,
            src,
            html_escape(caption),
            figcaption
        ));
    }

    if items.is_empty() {
        return Err("gallery has no images".to_string());
    }

    Ok(format!(
        r#"<div class="gallery" style="--gallery-columns: {}">{}</div>"#,
        columns, items
    ))
}

fn video_mime(src: &str) -> &'static str {
    let ext = src
        .rsplit('.')
        .next()
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "webm" => "video/webm",
        "ogg" | "ogv" => "video/ogg",
        "mov" => "video/quicktime",
        _ => "video/mp4",
    }
}

fn render_video(
    call: &ShortcodeCall<'_>,
    ctx: &mut ShortcodeContext<'_>,
) -> Result<String, String> {
    let reference = call.args.required("src", 0)?;
    let src = ctx.asset(reference, call.name);
    let poster = call
        .args
        .get("poster")
        .filter(|p| !p.is_empty())
        .map(|p| ctx.asset(p, call.name));

    let mut attrs = String::from(" controls");
    for flag in ["autoplay", "loop", "muted"] {
        if call.args.flag(flag) {
            attrs.push(' ');
            attrs.push_str(flag);
        }
    }
    // Browsers only autoplay muted video
    if call.args.flag("autoplay") && !call.args.flag("muted") {
        attrs.push_str(" muted");
    }
    attrs.push_str(&optional_attr("poster", poster.as_deref()));

    Ok(format!(
        r#"<div class="video"><video{} preload="metadata"><source src="{}" type="{}"></video></div>"#,
        attrs,
        html_escape(&src),
        video_mime(reference)
    ))
}

fn valid_embed_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn render_youtube(
    call: &ShortcodeCall<'_>,
    _ctx: &mut ShortcodeContext<'_>,
) -> Result<String, String> {
    let id = call.args.required("id", 0)?;
    if !valid_embed_id(id) {
        return Err(format!("invalid YouTube id {:?}", id));
    }
    let start = match call.args.get("start") {
        Some(start) => format!(
            "?start={}",
            start
                .parse::<u32>()
                .map_err(|_| format!("invalid start {:?}", start))?
        ),
        None => String::new(),
    };
    let title = call.args.get("title").unwrap_or("YouTube video");

    Ok(format!(
        r#"<div class="video-embed youtube"><iframe src="https://www.youtube-nocookie.com/embed/{}{}" title="{}" allow="accelerometer; clipboard-write; encrypted-media; gyroscope; picture-in-picture" allowfullscreen loading="lazy"></iframe></div>"#,
        id,
        start,
        html_escape(title)
    ))
}

fn render_vimeo(
    call: &ShortcodeCall<'_>,
    _ctx: &mut ShortcodeContext<'_>,
) -> Result<String, String> {
    let id = call.args.required("id", 0)?;
    if !id.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("invalid Vimeo id {:?}", id));
    }
    let title = call.args.get("title").unwrap_or("Vimeo video");

    Ok(format!(
        r#"<div class="video-embed vimeo"><iframe src="https://player.vimeo.com/video/{}" title="{}" allow="fullscreen; picture-in-picture" allowfullscreen loading="lazy"></iframe></div>"#,
        id,
        html_escape(title)
    ))
}

fn render_preview(
    call: &ShortcodeCall<'_>,
    ctx: &mut ShortcodeContext<'_>,
) -> Result<String, String> {
    let url = call.args.required("url", 0)?;
    let href = ctx.link(url);
    let title = call.args.get("title").unwrap_or(url);
    let description = call
        .args
        .get("description")
        .map(str::to_string)
        .or_else(|| call.body.as_ref().map(|b| b.trim().to_string()))
        .unwrap_or_default();
    let image = call
        .args
        .get("image")
        .filter(|i| !i.is_empty())
        .map(|i| ctx.asset(i, call.name));

    let host = if is_external(url) { host_of(url) } else { "" };
    let image_html = image
        .map(|src| {
            format!(
                r#"<img class="link-preview-image" src="{}" alt="" loading="lazy">"#,
                html_escape(&src)
            )
        })
        .unwrap_or_default();
    let description_html = if description.is_empty() {
        String::new()
    } else {
        format!("<p>{}</p>", html_escape(&description))
    };
    let host_html = if host.is_empty() {
        String::new()
    } else {
        format!(r#"<span class="link-preview-host">{}</span>"#, html_escape(host))
    };

    Ok(format!(
        r#"<div class="link-preview"><a href="{}">{}<span class="link-preview-body"><strong>{}</strong>{}{}</span></a></div>"#,
        html_escape(&href),
        image_html,
        html_escape(title),
        description_html,
        host_html
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(markdown: &str) -> (Result<String, ShortcodeError>, Vec<AssetRef>) {
        let registry = ShortcodeRegistry::builtin();
        let mut ctx = ShortcodeContext::new("/", "2024/03/01/post/", true);
        let result = registry.expand(markdown, &mut ctx);
        (result, ctx.into_assets())
    }

    #[test]
    fn test_parse_args() {
        let args = Args::parse(r#" src="a b.png" width=300 autoplay 'single' "#).unwrap();
        assert_eq!(args.get("src"), Some("a b.png"));
        assert_eq!(args.get("width"), Some("300"));
        assert_eq!(args.positional(0), Some("autoplay"));
        assert_eq!(args.positional(1), Some("single"));
        assert!(args.flag("autoplay"));
        assert!(!args.flag("loop"));
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(Args::parse(r#"src="unterminated"#).is_err());
        assert!(Args::parse("src= next").is_err());
    }

    #[test]
    fn test_figure_records_bundle_asset() {
        let (html, assets) = expand(r#"{{< figure src="cover.jpg" caption="The cover" >}}"#);
        let html = html.unwrap();
        assert_eq!(
            html,
            r#"<figure class="figure"><img src="/2024/03/01/post/cover.jpg" alt="The cover" loading="lazy"><figcaption>The cover</figcaption></figure>"#
        );
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].target, "2024/03/01/post/cover.jpg");
        assert_eq!(assets[0].origin, "figure");
    }

    #[test]
    fn test_img_is_inline_and_external_not_recorded() {
        let (html, assets) = expand(r#"See {{< img "https://example.com/a.png" "alt text" >}} here."#);
        assert_eq!(
            html.unwrap(),
            r#"See <img src="https://example.com/a.png" alt="alt text" loading="lazy"> here."#
        );
        assert!(assets.is_empty());
    }

    #[test]
    fn test_gallery_block() {
        let markdown = "{{< gallery columns=2 >}}\n- /images/one.png | First\n- /images/two.png\n{{< /gallery >}}\nAfter";
        let (html, assets) = expand(markdown);
        let html = html.unwrap();
        assert!(html.starts_with(r#"<div class="gallery" style="--gallery-columns: 2">"#));
        assert!(html.contains("<figcaption>First</figcaption>"));
        assert!(html.ends_with("</div>\nAfter"));
        let targets: Vec<_> = assets.iter().map(|a| a.target.as_str()).collect();
        assert_eq!(targets, vec!["images/one.png", "images/two.png"]);
    }

    #[test]
    fn test_gallery_requires_closing_tag() {
        let (result, _) = expand("{{< gallery >}}\n/images/a.png\n");
        let err = result.unwrap_err();
        assert_eq!(err.name, "gallery");
        assert_eq!(err.message, "missing closing tag");
    }

    #[test]
    fn test_youtube_and_vimeo() {
        let (html, _) = expand(r#"{{< youtube dQw4w9WgXcQ start=30 >}}"#);
        assert!(html
            .unwrap()
            .contains("https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ?start=30"));

        let (html, _) = expand(r#"{{< vimeo id="12345" >}}"#);
        assert!(html.unwrap().contains("https://player.vimeo.com/video/12345"));

        let (result, _) = expand(r#"{{< youtube "bad id!" >}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_video_records_poster() {
        let (html, assets) = expand(r#"{{< video src="demo.mp4" poster="poster.jpg" autoplay loop >}}"#);
        let html = html.unwrap();
        assert!(html.contains(" controls autoplay loop muted poster=\"/2024/03/01/post/poster.jpg\""));
        assert!(html.contains(r#"type="video/mp4""#));
        assert_eq!(assets.len(), 2);
    }

    #[test]
    fn test_preview_with_body() {
        let markdown = "{{< preview url=\"https://github.com/me/app\" title=\"App\" >}}A tiny app{{< /preview >}}";
        let (html, _) = expand(markdown);
        let html = html.unwrap();
        assert!(html.contains(r#"<a href="https://github.com/me/app">"#));
        assert!(html.contains("<p>A tiny app</p>"));
        assert!(html.contains(r#"<span class="link-preview-host">github.com</span>"#));
    }

    #[test]
    fn test_preview_without_body_leaves_later_close_alone() {
        let markdown = "{{< preview url=\"/about/\" >}}\n\n{{< preview url=\"/x/\" >}}B{{< /preview >}}";
        let (html, _) = expand(markdown);
        let html = html.unwrap();
        assert!(html.contains(r#"<a href="/about/">"#));
        assert!(html.contains("<p>B</p>"));
    }

    #[test]
    fn test_code_spans_and_indented_code_are_left_alone() {
        let markdown = "Write `{{< tweet 1 >}}` or ``{{</* img src=\"a.png\" */>}}``.\n\n    {{< tweet 2 >}}\n\nAfter";
        let (html, assets) = expand(markdown);
        assert_eq!(
            html.unwrap(),
            "Write `{{< tweet 1 >}}` or ``{{< img src=\"a.png\" >}}``.\n\n    {{< tweet 2 >}}\n\nAfter"
        );
        assert!(assets.is_empty());
    }

    #[test]
    fn test_shortcodes_outside_code_still_expand() {
        // A lone backtick does not reach past its paragraph, and indented
        // list continuations are not code
        let markdown = "A stray ` tick\n\n{{< youtube abc >}}\n\n- item\n\n    {{< vimeo 42 >}}\n";
        let (html, _) = expand(markdown);
        let html = html.unwrap();
        assert!(html.contains("youtube-nocookie.com/embed/abc"));
        assert!(html.contains("player.vimeo.com/video/42"));
    }

    #[test]
    fn test_unknown_shortcode_is_an_error() {
        let (result, _) = expand("{{< tweet 123 >}}");
        assert_eq!(
            result.unwrap_err(),
            ShortcodeError {
                name: "tweet".to_string(),
                message: "unknown shortcode".to_string()
            }
        );
    }

    #[test]
    fn test_missing_required_argument() {
        let (result, _) = expand("{{< figure caption=\"no src\" >}}");
        assert_eq!(result.unwrap_err().message, "missing required argument `src`");
    }

    #[test]
    fn test_escaped_shortcode_renders_literally() {
        let (html, assets) = expand("Write {{</* figure src=\"x.png\" */>}} to embed.");
        assert_eq!(html.unwrap(), "Write {{< figure src=\"x.png\" >}} to embed.");
        assert!(assets.is_empty());
    }

    #[test]
    fn test_fenced_code_is_untouched() {
        let markdown = "```markdown\n{{< figure src=\"x.png\" >}}\n{{</* img a */>}}\n```\n{{< img \"/images/b.png\" >}}\n";
        let (html, assets) = expand(markdown);
        let html = html.unwrap();
        assert!(html.contains("{{< figure src=\"x.png\" >}}\n{{< img a >}}\n```"));
        assert!(html.contains(r#"<img src="/images/b.png""#));
        assert_eq!(assets.len(), 1);
    }

    #[test]
    fn test_split_fences() {
        let segments = split_fences("a\n~~~~\ncode\n~~~\n~~~~\nb\n");
        assert_eq!(
            segments,
            vec![(false, "a\n"), (true, "~~~~\ncode\n~~~\n~~~~\n"), (false, "b\n")]
        );
    }
}
