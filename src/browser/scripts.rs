//! JavaScript snippets evaluated in the page.
//!
//! Each snippet is a single expression. Async work is wrapped in an async
//! IIFE so `Runtime.evaluate` awaits the returned promise.

/// `document.readyState` plus the current location, as `"state|href"`.
pub const READY_STATE: &str = "document.readyState + '|' + location.href";

/// Scroll down in fixed steps, pausing between steps.
pub fn scroll_steps(steps: u32, step_px: u32, delay_ms: u64) -> String {
    format!(
        r#"(async () => {{
    for (let i = 0; i < {steps}; i++) {{
        window.scrollBy(0, {step_px});
        await new Promise(r => setTimeout(r, {delay_ms}));
    }}
    return true;
}})()"#
    )
}

pub const SCROLL_TO_BOTTOM: &str =
    "window.scrollTo(0, document.body ? document.body.scrollHeight : 0), true";

pub const SCROLL_TO_TOP: &str = "window.scrollTo(0, 0), true";

/// Visit `positions` evenly spaced offsets from the top of the page.
pub fn scroll_positions(positions: u32, delay_ms: u64) -> String {
    format!(
        r#"(async () => {{
    const n = {positions};
    for (let i = 0; i < n; i++) {{
        const height = document.body ? document.body.scrollHeight : 0;
        window.scrollTo(0, (height / n) * i);
        await new Promise(r => setTimeout(r, {delay_ms}));
    }}
    return true;
}})()"#
    )
}

/// Promote lazy-loading attributes to `src`, re-point SVG `<use>` references,
/// and pin computed fonts on icon elements.
pub const FORCE_LAZY_CONTENT: &str = r#"(() => {
    let promoted = 0;
    document.querySelectorAll('img').forEach(img => {
        if (img.loading === 'lazy') img.loading = 'eager';
        const lazy = img.dataset.src || img.dataset.lazySrc || img.dataset.original || img.dataset.lazyLoad;
        if (lazy) { img.src = lazy; promoted++; }
        img.removeAttribute('loading');
    });
    document.querySelectorAll('svg use').forEach(use => {
        if (use.href && use.href.baseVal) {
            use.setAttribute('xlink:href', use.href.baseVal);
        }
    });
    document.querySelectorAll('[class*="icon"], [class*="fa-"], i').forEach(el => {
        el.style.fontFamily = window.getComputedStyle(el).fontFamily;
    });
    return promoted;
})()"#;

/// Click toggles, open dropdowns and unhide hidden elements.
pub const REVEAL_HIDDEN: &str = r#"(() => {
    let touched = 0;
    document.querySelectorAll('[role="tab"], .tab, .accordion, .accordion-button, .collapse, [data-toggle], [data-bs-toggle], [aria-expanded="false"]').forEach(el => {
        try {
            el.click();
            el.dispatchEvent(new Event('click'));
            if (el.getAttribute('aria-expanded') === 'false') {
                el.setAttribute('aria-expanded', 'true');
            }
            touched++;
        } catch (e) {}
    });
    document.querySelectorAll('.dropdown, [data-hover], .menu-item, .has-dropdown, .dropdown-toggle').forEach(el => {
        try {
            el.classList.add('show', 'open', 'active');
            el.dispatchEvent(new MouseEvent('mouseenter', { bubbles: true }));
            el.dispatchEvent(new MouseEvent('mouseover', { bubbles: true }));
            touched++;
        } catch (e) {}
    });
    document.querySelectorAll('[hidden], .hidden, .d-none').forEach(el => {
        el.removeAttribute('hidden');
        el.style.display = '';
        el.classList.remove('hidden', 'd-none');
        touched++;
    });
    return touched;
})()"#;

/// Resource URLs per category, serialized as a JSON string.
pub const COLLECT_RESOURCES: &str = r#"(() => {
    const urls = { css: new Set(), js: new Set(), images: new Set(), fonts: new Set(), svgs: new Set() };
    const usable = (u) => u && !u.startsWith('data:') && !u.startsWith('blob:');
    const urlPattern = /url\(["']?([^"')]+)["']?\)/g;

    document.querySelectorAll('link[rel="stylesheet"], link[rel="preload"][as="style"], link[href*=".css"], style[data-href]').forEach(el => {
        const href = el.href || el.dataset.href;
        if (usable(href)) urls.css.add(href);
    });

    document.querySelectorAll('script[src], script[data-src]').forEach(el => {
        const src = el.src || el.dataset.src;
        if (usable(src)) urls.js.add(src);
    });

    // URLs may contain commas; descriptors end at a comma outside parentheses.
    const srcsetUrls = (srcset) => {
        const out = [];
        let i = 0;
        while (i < srcset.length) {
            while (i < srcset.length && /[\s,]/.test(srcset[i])) i++;
            const start = i;
            while (i < srcset.length && !/\s/.test(srcset[i])) i++;
            let url = srcset.slice(start, i);
            if (url.endsWith(',')) {
                url = url.replace(/,+$/, '');
            } else {
                let depth = 0;
                for (; i < srcset.length; i++) {
                    const c = srcset[i];
                    if (c === '(') depth++;
                    else if (c === ')') depth = Math.max(0, depth - 1);
                    else if (c === ',' && depth === 0) break;
                }
            }
            if (url) out.push(url);
        }
        return out;
    };

    document.querySelectorAll('img, picture source, [data-src], [data-lazy-src], [data-original], video, [srcset]').forEach(el => {
        if (typeof el.src === 'string' && usable(el.src)) urls.images.add(el.src);
        ['src', 'lazySrc', 'original', 'lazy', 'lazyLoad', 'dataSrc'].forEach(attr => {
            const val = el.dataset[attr];
            if (usable(val)) urls.images.add(val);
        });
        const srcset = el.getAttribute('srcset');
        if (srcset) srcsetUrls(srcset).forEach(url => { if (usable(url)) urls.images.add(url); });
    });

    document.querySelectorAll('*').forEach(el => {
        try {
            const bg = window.getComputedStyle(el).backgroundImage;
            if (bg && bg !== 'none') {
                for (const m of bg.matchAll(urlPattern)) {
                    if (usable(m[1])) urls.images.add(m[1]);
                }
            }
        } catch (e) {}
    });

    document.querySelectorAll('svg, use, image[href], image[xlink\\:href]').forEach(el => {
        const href = (el.href && el.href.baseVal) || el.getAttribute('href') || el.getAttribute('xlink:href');
        if (href && !href.startsWith('#') && !href.startsWith('data:')) urls.svgs.add(href);
    });

    for (const sheet of Array.from(document.styleSheets)) {
        try {
            for (const rule of Array.from(sheet.cssRules || [])) {
                const text = rule.cssText || '';
                if (!text.includes('@font-face') && !text.includes('font-family')) continue;
                for (const m of text.matchAll(/url\(["']?([^"')]+\.(?:woff2?|ttf|eot|otf|svg)(?:[?#][^"')]*)?)["']?\)/gi)) {
                    const base = sheet.href || document.baseURI;
                    try { urls.fonts.add(new URL(m[1], base).href); } catch (e) {}
                }
            }
        } catch (e) {}
    }

    return JSON.stringify({
        css: Array.from(urls.css),
        js: Array.from(urls.js),
        images: Array.from(urls.images),
        fonts: Array.from(urls.fonts),
        svgs: Array.from(urls.svgs),
    });
})()"#;

/// All page CSS: style blocks, inline style attributes, computed rules for
/// up to `max_computed` elements, and every readable stylesheet rule.
pub fn extract_page_css(max_computed: usize) -> String {
    format!(
        r#"(() => {{
    let css = '';
    const selectorFor = (el, attr, idx) => {{
        const className = typeof el.className === 'string' ? el.className : '';
        const classes = className.split(' ').filter(c => c.trim()).join('.');
        const id = el.id ? `#${{el.id}}` : '';
        let selector = el.tagName.toLowerCase() + id + (classes ? '.' + classes : '');
        if (!id && !classes) {{
            el.setAttribute(attr, idx);
            selector += `[${{attr}}="${{idx}}"]`;
            return [selector, true];
        }}
        return [selector, false];
    }};

    document.querySelectorAll('style').forEach(style => {{
        if (style.textContent) {{
            css += `\n/* ========== Style Block ========== */\n${{style.textContent}}\n`;
        }}
    }});

    let inlineIdx = 0;
    document.querySelectorAll('[style]').forEach(el => {{
        const style = el.getAttribute('style');
        if (style && style.trim()) {{
            const [selector, tagged] = selectorFor(el, 'data-inline-s', inlineIdx);
            if (tagged) inlineIdx++;
            css += `${{selector}} {{ ${{style}} }}\n`;
        }}
    }});

    let computedCount = 0;
    let computedIdx = 0;
    for (const el of Array.from(document.querySelectorAll('*'))) {{
        if (computedCount >= {max_computed}) break;
        try {{
            const computed = window.getComputedStyle(el);
            const bg = computed.backgroundImage;
            const font = computed.fontFamily;
            const content = computed.content;
            let rule = '';
            if (bg && bg !== 'none' && !bg.includes('data:')) {{
                rule += `  background-image: ${{bg}};\n`;
                rule += `  background-size: ${{computed.backgroundSize}};\n`;
                rule += `  background-position: ${{computed.backgroundPosition}};\n`;
                rule += `  background-repeat: ${{computed.backgroundRepeat}};\n`;
                rule += `  background-attachment: ${{computed.backgroundAttachment}};\n`;
            }}
            if (font && !font.includes('Times') && !font.includes('serif')) {{
                rule += `  font-family: ${{font}};\n`;
                rule += `  font-size: ${{computed.fontSize}};\n`;
                rule += `  font-weight: ${{computed.fontWeight}};\n`;
                rule += `  font-style: ${{computed.fontStyle}};\n`;
            }}
            if (content && content !== 'none' && content !== 'normal') {{
                rule += `  content: ${{content}};\n`;
            }}
            if (rule) {{
                const [selector, tagged] = selectorFor(el, 'data-computed-s', computedIdx);
                if (tagged) computedIdx++;
                css += `\n${{selector}} {{\n${{rule}}}}\n`;
                computedCount++;
            }}
        }} catch (e) {{}}
    }}

    for (const sheet of Array.from(document.styleSheets)) {{
        try {{
            for (const rule of Array.from(sheet.cssRules || [])) {{
                if (rule.cssText) css += rule.cssText + '\n';
            }}
        }} catch (e) {{}}
    }}

    return css;
}})()"#
    )
}

/// Bodies of inline scripts, minus analytics snippets.
pub const EXTRACT_INLINE_JS: &str = r#"(() => {
    const skip = ['google-analytics', 'gtag', 'googletagmanager', 'facebook.com/tr'];
    let js = '';
    document.querySelectorAll('script:not([src])').forEach(script => {
        const type = (script.type || '').toLowerCase();
        if (type && !['text/javascript', 'application/javascript', 'module', 'text/ecmascript'].includes(type)) return;
        const content = script.textContent;
        if (content && content.trim() && !skip.some(s => content.includes(s))) {
            js += `\n${content}\n`;
        }
    });
    return js;
})()"#;

/// Serialized document including the doctype.
pub const OUTER_HTML: &str = r#"(() => {
    const dt = document.doctype;
    const doctype = dt ? `<!DOCTYPE ${dt.name}>\n` : '';
    return doctype + document.documentElement.outerHTML;
})()"#;
