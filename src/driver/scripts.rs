//! Page scripts evaluated by the browser driver.
//!
//! Parameterized scripts take their arguments as one JSON literal so no
//! caller-provided text is ever spliced into code.

#![cfg_attr(not(feature = "browser"), allow(dead_code))]

use serde::Serialize;

use super::Locator;

pub const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight); true";

/// Bring the pager into the viewport so lazy pagers render.
pub const PAGINATOR_INTO_VIEW: &str =
    "window.scrollTo(0, Math.max(0, document.body.scrollHeight - 200)); true";

/// Nudge lazy-loaded product media.
pub const SCROLL_JIGGLE: &str = r#"
    window.scrollTo(0, 160);
    window.scrollTo(0, document.body.scrollHeight * 0.6);
    window.scrollTo(0, 0);
    true
"#;

pub const DUMP_LOCAL_STORAGE: &str = "Object.assign({}, window.localStorage)";

/// Stealth evasion scripts, based on puppeteer-extra-plugin-stealth.
pub const STEALTH_SCRIPTS: &[&str] = &[
    r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    r#"
    window.chrome = window.chrome || { runtime: {}, loadTimes: function() {}, csi: function() {}, app: {} };
    "#,
    r#"
    Object.defineProperty(navigator, 'languages', {
        get: () => ['pt-BR', 'pt', 'en-US', 'en'],
        configurable: true
    });
    "#,
    r#"
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' }
        ],
        configurable: true
    });
    "#,
];

/// Shared element lookup used by the parameterized scripts.
const FIND_HELPERS: &str = r#"
    const visible = (el) => {
        if (!el || el.disabled || el.getAttribute('aria-disabled') === 'true') return false;
        const r = el.getBoundingClientRect();
        const s = window.getComputedStyle(el);
        return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none';
    };
    const findAll = (loc) => {
        if (loc.kind === 'css') return Array.from(document.querySelectorAll(loc.value));
        const out = [];
        const it = document.evaluate(loc.value, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
        for (let i = 0; i < it.snapshotLength; i++) out.push(it.snapshotItem(i));
        return out;
    };
    const norm = (t) => (t || '').replace(/\s+/g, ' ').trim();
"#;

fn with_args<T: Serialize>(body: &str, args: &T) -> String {
    let json = serde_json::to_string(args).unwrap_or_else(|_| "null".to_string());
    format!(
        "(function(args) {{ {} {} }})({})",
        FIND_HELPERS, body, json
    )
}

/// Click the first visible match of any locator; evaluates to a bool.
pub fn click(locators: &[Locator]) -> String {
    with_args(
        r#"
        for (const loc of args) {
            let nodes;
            try { nodes = findAll(loc); } catch (e) { continue; }
            const el = nodes.find(visible);
            if (!el) continue;
            el.scrollIntoView({ block: 'center' });
            el.click();
            return true;
        }
        return false;
        "#,
        &locators,
    )
}

/// Set an input's value and fire input/change; evaluates to a bool.
pub fn fill(locator: &Locator, value: &str) -> String {
    #[derive(Serialize)]
    struct Args<'a> {
        locator: &'a Locator,
        value: &'a str,
    }
    with_args(
        r#"
        const el = findAll(args.locator)[0];
        if (!el) return false;
        el.focus();
        const setter = Object.getOwnPropertyDescriptor(HTMLInputElement.prototype, 'value').set;
        setter.call(el, args.value);
        el.dispatchEvent(new Event('input', { bubbles: true }));
        el.dispatchEvent(new Event('change', { bubbles: true }));
        return true;
        "#,
        &Args { locator, value },
    )
}

#[derive(Serialize)]
pub struct VariationArgs<'a> {
    pub group_selector: &'a str,
    pub chip_selector: &'a str,
    pub index: usize,
    pub chips: bool,
    pub value: &'a str,
    pub collapse: bool,
}

/// Choose one option inside the `index`-th variation block; evaluates to a bool.
pub fn select_variation(args: &VariationArgs<'_>) -> String {
    with_args(
        r#"
        const key = (t) => {
            let s = norm(t);
            if (args.collapse) { const m = s.match(/(\d{1,2})/); if (m) s = m[1]; }
            return s.toLowerCase();
        };
        const want = key(args.value);
        const block = document.querySelectorAll(args.group_selector)[args.index];
        if (!block) return false;
        if (args.chips) {
            const chip = Array.from(block.querySelectorAll(args.chip_selector))
                .find((el) => key(el.textContent) === want);
            if (!chip) return false;
            chip.scrollIntoView({ block: 'center' });
            chip.click();
            return true;
        }
        for (const sel of block.querySelectorAll('select')) {
            const opt = Array.from(sel.options).find((o) => key(o.textContent) === want);
            if (!opt) continue;
            sel.value = opt.value;
            sel.dispatchEvent(new Event('input', { bubbles: true }));
            sel.dispatchEvent(new Event('change', { bubbles: true }));
            return true;
        }
        return false;
        "#,
        args,
    )
}

/// Raw hrefs of product anchors in document order.
pub fn product_hrefs(selector: &str) -> String {
    with_args(
        r#"
        return Array.from(document.querySelectorAll(args))
            .map((a) => a.getAttribute('href'))
            .filter((h) => !!h);
        "#,
        &selector,
    )
}

/// Write every entry into window.localStorage; evaluates to the count written.
pub fn restore_local_storage<T: Serialize>(entries: &T) -> String {
    with_args(
        r#"
        let n = 0;
        for (const [k, v] of Object.entries(args || {})) {
            try { window.localStorage.setItem(k, v); n++; } catch (e) {}
        }
        return n;
        "#,
        entries,
    )
}
