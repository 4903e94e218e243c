//! Print markup - LaTeX serialization of derived booklets
//!
//! One `tabular` per ticket. The column spec and rule ranges depend on the
//! number of volumes, so they are recomputed for every ticket. Running the
//! TeX engine on the result is the caller's business.

use crate::ticket::{DerivedBooklet, DerivedTicket, DerivedVolume, Dimensions, PageLayout};

/// Render a whole booklet as a standalone LaTeX document.
pub fn render_booklet(booklet: &DerivedBooklet) -> String {
    let mut out = preamble(&booklet.filename, &booklet.layout);

    for (n, page) in booklet.pages.iter().enumerate() {
        if n > 0 {
            out.push_str("\\newpage\n");
        }
        out.push_str(&format!("% page {}\n", n + 1));
        for (m, ticket) in page.iter().enumerate() {
            if m > 0 {
                out.push_str(&format!("\\vspace{{{}mm}}\n\n", booklet.layout.ticket_spacing));
            }
            out.push_str(&render_ticket(ticket));
        }
    }

    out.push_str("\\end{document}\n");
    out
}

fn preamble(filename: &str, layout: &PageLayout) -> String {
    let baseline = layout.font_size as f64 * 1.2;
    let mut out = String::new();
    out.push_str(&format!("% {}\n", escape_comment(filename)));
    out.push_str("\\documentclass{article}\n");
    out.push_str(&format!(
        "\\usepackage[left={}mm,right={}mm,top={}mm,bottom={}mm]{{geometry}}\n",
        layout.left_margin, layout.right_margin, layout.upper_margin, layout.lower_margin
    ));
    out.push_str("\\usepackage{array}\n");
    out.push_str("\\pagestyle{empty}\n");
    out.push_str("\\setlength{\\parindent}{0pt}\n");
    out.push_str(&format!("\\renewcommand{{\\arraystretch}}{{{}}}\n", layout.vertical_stretch));
    out.push_str("\\begin{document}\n");
    out.push_str(&format!(
        "\\fontsize{{{}}}{{{:.1}}}\\selectfont\n\n",
        layout.font_size, baseline
    ));
    out
}

/// Render one ticket table.
///
/// Layout: a header row with the styled title and one label per volume,
/// a row with the color and an H/W pair per volume, then one row for each
/// of cardboard, paper, buckram and backcard.
pub fn render_ticket(ticket: &DerivedTicket) -> String {
    let style = &ticket.style;
    let volumes = ticket.volumes.len();
    let rule = volume_rule(volumes);
    let mut out = String::new();

    let columns = column_spec(volumes, style.volume_separation);
    out.push_str(&format!("\\begin{{tabular}}{{{}}}\n", columns));
    out.push_str("\\hline\n");

    let mut header = format!(
        "\\parbox[t]{{{}mm}}{{{{{} {}}}}}",
        style.title_width,
        style.title_styling,
        escape_latex(&ticket.title)
    );
    for v in &ticket.volumes {
        header.push_str(&format!(" & \\multicolumn{{2}}{{c|}}{{{}}}", escape_latex(&v.label)));
    }
    out.push_str(&header);
    out.push_str(" \\\\\n");

    let mut sub_header = label_cell(&ticket.color, style.label_width);
    for _ in &ticket.volumes {
        sub_header.push_str(" & H & W");
    }
    out.push_str(&sub_header);
    out.push_str(" \\\\\n\\hline\n");

    let components: [(&str, fn(&DerivedVolume) -> Dimensions); 4] = [
        (style.cardboard_label.as_str(), |v: &DerivedVolume| v.cardboard),
        (style.paper_label.as_str(), |v: &DerivedVolume| v.paper),
        (style.buckram_label.as_str(), |v: &DerivedVolume| v.buckram),
        (style.backcard_label.as_str(), |v: &DerivedVolume| v.backcard),
    ];
    for (i, (label, dimensions)) in components.iter().enumerate() {
        let mut row = label_cell(label, style.label_width);
        for v in &ticket.volumes {
            let d = dimensions(v);
            row.push_str(&format!(" & {} & {}", d.height, d.width));
        }
        out.push_str(&row);
        out.push_str(" \\\\\n");
        if i + 1 < components.len() {
            if let Some(rule) = &rule {
                out.push_str(rule);
                out.push('\n');
            }
        }
    }

    out.push_str("\\hline\n\\end{tabular}\n");
    out
}

/// `|l|` followed by one `r r|` group per volume, padded by the separation.
pub fn column_spec(volumes: usize, separation: i64) -> String {
    let group = format!("@{{\\hspace{{{separation}mm}}}}r r@{{\\hspace{{{separation}mm}}}}|");
    format!("|l|{}", group.repeat(volumes))
}

/// Partial rule under the volume columns, or none when there are no volumes.
pub fn volume_rule(volumes: usize) -> Option<String> {
    (volumes > 0).then(|| format!("\\cline{{2-{}}}", 1 + 2 * volumes))
}

fn label_cell(label: &str, width: i64) -> String {
    format!("\\makebox[{}mm][l]{{{}}}", width, escape_latex(label))
}

/// Escape text for LaTeX body content.
pub fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_comment(text: &str) -> String {
    text.replace(|c: char| c == '\n' || c == '\r', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_latex() {
        assert_eq!(escape_latex("Arts & Crafts 50%"), "Arts \\& Crafts 50\\%");
        assert_eq!(escape_latex("a_b{c}"), "a\\_b\\{c\\}");
        assert_eq!(escape_latex("x\\y"), "x\\textbackslash{}y");
        assert_eq!(escape_latex("1990--1991"), "1990--1991");
    }

    #[test]
    fn test_column_spec_grows_with_volumes() {
        assert_eq!(column_spec(0, 2), "|l|");
        let spec = column_spec(3, 2);
        assert!(spec.starts_with("|l|"));
        assert_eq!(spec.matches("r r").count(), 3);
    }

    #[test]
    fn test_volume_rule_range() {
        assert_eq!(volume_rule(0), None);
        assert_eq!(volume_rule(1).as_deref(), Some("\\cline{2-3}"));
        assert_eq!(volume_rule(3).as_deref(), Some("\\cline{2-7}"));
    }
}
