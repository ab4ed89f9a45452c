//! Full-document shell wrapped around a compiled sheet.
//!
//! Three flavours share one head: the interactive preview (page guide, runtime
//! scripts, diagnostic bootstrap), the print document fed to the rasterizer, and
//! the diagnostic document shown when content cannot be compiled.

use crate::compiler::escape::escape_html;
use crate::compiler::CompiledDocument;
use crate::layout::PageGeometry;
use crate::sandbox::policy::SandboxPolicy;

/// Catches anything thrown inside the surface and renders it as text in the
/// surface. Also reports the sheet's unscaled size to the embedding page.
const BOOTSTRAP_SCRIPT: &str = r#"(function(){
  function show(err){
    var msg = err && (err.stack || err.message) ? (err.stack || err.message) : String(err);
    var pre = document.createElement('pre');
    pre.className = 'sandbox-diagnostic';
    pre.textContent = msg;
    var target = document.body || document.documentElement;
    target.insertBefore(pre, target.firstChild);
  }
  window.__resumeDiagnostic = show;
  window.addEventListener('error', function(ev){ show(ev.error || ev.message); ev.preventDefault(); });
  window.addEventListener('unhandledrejection', function(ev){ show(ev.reason); ev.preventDefault(); });
  function report(){
    var sheet = document.querySelector('.resume-sheet');
    if (!sheet || window.parent === window) return;
    window.parent.postMessage({type: 'resume-sheet-size', width: sheet.scrollWidth, height: sheet.scrollHeight}, '*');
  }
  window.addEventListener('load', report);
  document.addEventListener('DOMContentLoaded', function(){
    var sheet = document.querySelector('.resume-sheet');
    if (sheet && window.ResizeObserver) new ResizeObserver(report).observe(sheet);
    report();
  });
})();"#;

#[derive(Debug, Clone)]
pub struct DocumentShell {
    geometry: PageGeometry,
    policy: SandboxPolicy,
    extra_css: String,
}

#[derive(Clone, Copy, PartialEq)]
enum Flavour {
    Interactive,
    Print,
}

impl DocumentShell {
    pub fn new(geometry: PageGeometry, policy: SandboxPolicy, extra_css: Option<String>) -> Self {
        Self {
            geometry,
            policy,
            // Host CSS is operator-supplied, but it still must not end the style element.
            extra_css: extra_css.unwrap_or_default().replace("</", "<\\/"),
        }
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    pub fn policy(&self) -> &SandboxPolicy {
        &self.policy
    }

    /// Document for the live preview surface.
    pub fn interactive(&self, doc: &CompiledDocument) -> String {
        self.render(Flavour::Interactive, "Live Preview", doc.as_str())
    }

    /// Script-free document for rasterization.
    pub fn print(&self, doc: &CompiledDocument, title: &str) -> String {
        let title = if title.trim().is_empty() { "Resume" } else { title };
        self.render(Flavour::Print, title, doc.as_str())
    }

    /// Surface content shown in place of the resume when it cannot be rendered.
    pub fn diagnostic(&self, message: &str) -> String {
        let body = format!(
            "<pre class=\"sandbox-diagnostic\">{}</pre>",
            escape_html(message)
        );
        self.render(Flavour::Print, "Live Preview", &body)
    }

    fn render(&self, flavour: Flavour, title: &str, sheet: &str) -> String {
        let mut html = String::with_capacity(sheet.len() + 2048);
        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        html.push_str("<meta charset=\"utf-8\">\n");
        html.push_str("<meta name=\"viewport\" content=\"width=device-width,initial-scale=1\">\n");
        html.push_str(&format!(
            "<meta http-equiv=\"Content-Security-Policy\" content=\"{}\">\n",
            escape_html(&self.policy.content_security_policy())
        ));
        html.push_str(&format!("<title>{}</title>\n", escape_html(title)));
        html.push_str("<style>\n");
        html.push_str(&self.base_css(flavour));
        if !self.extra_css.is_empty() {
            html.push_str(&self.extra_css);
            html.push('\n');
        }
        html.push_str("</style>\n");

        if flavour == Flavour::Interactive {
            html.push_str("<script>\n");
            html.push_str(BOOTSTRAP_SCRIPT);
            html.push_str("\n</script>\n");
            for url in self.policy.runtime_scripts() {
                html.push_str(&format!(
                    "<script src=\"{}\" crossorigin=\"anonymous\"></script>\n",
                    escape_html(url.as_str())
                ));
            }
        }

        html.push_str("</head>\n<body>\n<div class=\"resume-sheet\">\n");
        html.push_str(sheet);
        html.push_str("</div>\n</body>\n</html>\n");
        html
    }

    fn base_css(&self, flavour: Flavour) -> String {
        let width = self.geometry.css_width();
        let height = self.geometry.css_height();
        let page_size = self.geometry.css_page_size();

        let mut css = format!(
            "html,body{{margin:0;padding:0;overflow-x:hidden;font-size:16px;}}\n\
             @page{{size:{page_size};margin:0;}}\n\
             .resume-sheet{{width:{width};min-height:{height};box-sizing:border-box;background-color:#fff;margin:0 auto;}}\n\
             .sandbox-diagnostic{{margin:0;padding:8mm;color:#b00020;font:13px/1.4 ui-monospace,monospace;white-space:pre-wrap;word-break:break-word;}}\n"
        );

        match flavour {
            Flavour::Interactive => css.push_str(&format!(
                ".resume-sheet{{box-shadow:0 0 4px rgba(0,0,0,.15);\
                 background-image:repeating-linear-gradient(to bottom,transparent 0,transparent calc({height} - 1px),#d0d0d0 calc({height} - 1px),#d0d0d0 {height});}}\n"
            )),
            Flavour::Print => css.push_str(
                "html,body{-webkit-print-color-adjust:exact;print-color-adjust:exact;}\n",
            ),
        }
        css
    }
}
