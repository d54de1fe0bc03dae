//! The built-in HTML DTD.
//!
//! A compact HTML 4.01 Transitional grammar with the HTML5 sectioning and media
//! elements added to the block and inline groups. It is parsed once, on first
//! use, and shared read-only afterwards.

use std::fmt::Write as _;
use std::sync::LazyLock;

use tracing::debug;

use super::dtd::SgmlDtd;
use super::dtd_parser::DtdParser;
use crate::error::SgmlError;

/// Latin-1 entity names, in code point order from U+00A0 to U+00FF.
const LATIN1_ENTITIES: [&str; 96] = [
    "nbsp", "iexcl", "cent", "pound", "curren", "yen", "brvbar", "sect", "uml", "copy", "ordf", "laquo", "not", "shy",
    "reg", "macr", "deg", "plusmn", "sup2", "sup3", "acute", "micro", "para", "middot", "cedil", "sup1", "ordm",
    "raquo", "frac14", "frac12", "frac34", "iquest", "Agrave", "Aacute", "Acirc", "Atilde", "Auml", "Aring", "AElig",
    "Ccedil", "Egrave", "Eacute", "Ecirc", "Euml", "Igrave", "Iacute", "Icirc", "Iuml", "ETH", "Ntilde", "Ograve",
    "Oacute", "Ocirc", "Otilde", "Ouml", "times", "Oslash", "Ugrave", "Uacute", "Ucirc", "Uuml", "Yacute", "THORN",
    "szlig", "agrave", "aacute", "acirc", "atilde", "auml", "aring", "aelig", "ccedil", "egrave", "eacute", "ecirc",
    "euml", "igrave", "iacute", "icirc", "iuml", "eth", "ntilde", "ograve", "oacute", "ocirc", "otilde", "ouml",
    "divide", "oslash", "ugrave", "uacute", "ucirc", "uuml", "yacute", "thorn", "yuml",
];

/// Symbol and special entities of HTML 4, plus `apos`.
const NAMED_ENTITIES: &[(&str, u32)] = &[
    ("quot", 34), ("amp", 38), ("apos", 39), ("lt", 60), ("gt", 62),
    ("OElig", 338), ("oelig", 339), ("Scaron", 352), ("scaron", 353), ("Yuml", 376), ("fnof", 402),
    ("circ", 710), ("tilde", 732),
    ("Alpha", 913), ("Beta", 914), ("Gamma", 915), ("Delta", 916), ("Epsilon", 917), ("Zeta", 918), ("Eta", 919),
    ("Theta", 920), ("Iota", 921), ("Kappa", 922), ("Lambda", 923), ("Mu", 924), ("Nu", 925), ("Xi", 926),
    ("Omicron", 927), ("Pi", 928), ("Rho", 929), ("Sigma", 931), ("Tau", 932), ("Upsilon", 933), ("Phi", 934),
    ("Chi", 935), ("Psi", 936), ("Omega", 937),
    ("alpha", 945), ("beta", 946), ("gamma", 947), ("delta", 948), ("epsilon", 949), ("zeta", 950), ("eta", 951),
    ("theta", 952), ("iota", 953), ("kappa", 954), ("lambda", 955), ("mu", 956), ("nu", 957), ("xi", 958),
    ("omicron", 959), ("pi", 960), ("rho", 961), ("sigmaf", 962), ("sigma", 963), ("tau", 964), ("upsilon", 965),
    ("phi", 966), ("chi", 967), ("psi", 968), ("omega", 969), ("thetasym", 977), ("upsih", 978), ("piv", 982),
    ("ensp", 8194), ("emsp", 8195), ("thinsp", 8201), ("zwnj", 8204), ("zwj", 8205), ("lrm", 8206), ("rlm", 8207),
    ("ndash", 8211), ("mdash", 8212), ("lsquo", 8216), ("rsquo", 8217), ("sbquo", 8218), ("ldquo", 8220),
    ("rdquo", 8221), ("bdquo", 8222), ("dagger", 8224), ("Dagger", 8225), ("bull", 8226), ("hellip", 8230),
    ("permil", 8240), ("prime", 8242), ("Prime", 8243), ("lsaquo", 8249), ("rsaquo", 8250), ("oline", 8254),
    ("frasl", 8260), ("euro", 8364), ("image", 8465), ("weierp", 8472), ("real", 8476), ("trade", 8482),
    ("alefsym", 8501), ("larr", 8592), ("uarr", 8593), ("rarr", 8594), ("darr", 8595), ("harr", 8596),
    ("crarr", 8629), ("lArr", 8656), ("uArr", 8657), ("rArr", 8658), ("dArr", 8659), ("hArr", 8660),
    ("forall", 8704), ("part", 8706), ("exist", 8707), ("empty", 8709), ("nabla", 8711), ("isin", 8712),
    ("notin", 8713), ("ni", 8715), ("prod", 8719), ("sum", 8721), ("minus", 8722), ("lowast", 8727),
    ("radic", 8730), ("prop", 8733), ("infin", 8734), ("ang", 8736), ("and", 8743), ("or", 8744), ("cap", 8745),
    ("cup", 8746), ("int", 8747), ("there4", 8756), ("sim", 8764), ("cong", 8773), ("asymp", 8776), ("ne", 8800),
    ("equiv", 8801), ("le", 8804), ("ge", 8805), ("sub", 8834), ("sup", 8835), ("nsub", 8836), ("sube", 8838),
    ("supe", 8839), ("oplus", 8853), ("otimes", 8855), ("perp", 8869), ("sdot", 8901), ("lceil", 8968),
    ("rceil", 8969), ("lfloor", 8970), ("rfloor", 8971), ("lang", 9001), ("rang", 9002), ("loz", 9674),
    ("spades", 9824), ("clubs", 9827), ("hearts", 9829), ("diams", 9830),
];

const ELEMENT_DECLARATIONS: &str = r##"
<!ENTITY % heading "H1|H2|H3|H4|H5|H6">
<!ENTITY % list "UL | OL | DIR | MENU">
<!ENTITY % fontstyle "TT | I | B | U | S | STRIKE | BIG | SMALL | NOBR">
<!ENTITY % phrase "EM | STRONG | DFN | CODE | SAMP | KBD | VAR | CITE | ABBR | ACRONYM | MARK | TIME">
<!ENTITY % special
   "A | IMG | APPLET | OBJECT | FONT | BASEFONT | BR | WBR | SCRIPT | MAP | Q | SUB | SUP | SPAN | BDO |
    IFRAME | EMBED | VIDEO | AUDIO | CANVAS | PICTURE | SOURCE">
<!ENTITY % formctrl "INPUT | SELECT | TEXTAREA | LABEL | BUTTON">
<!ENTITY % misc "STYLE | LINK | META | INS | DEL | NOSCRIPT">
<!ENTITY % inline "#PCDATA | %fontstyle; | %phrase; | %special; | %formctrl; | %misc;">
<!ENTITY % sectioning
   "SECTION | ARTICLE | NAV | ASIDE | HEADER | FOOTER | MAIN | FIGURE | FIGCAPTION | DETAILS | SUMMARY | HGROUP">
<!ENTITY % block
   "P | %heading; | %list; | PRE | DL | DIV | CENTER | NOFRAMES | BLOCKQUOTE | FORM | ISINDEX | HR | TABLE |
    FIELDSET | ADDRESS | %sectioning;">
<!ENTITY % flow "%block; | %inline;">

<!ENTITY % coreattrs
   "id ID #IMPLIED
    class CDATA #IMPLIED
    style CDATA #IMPLIED
    title CDATA #IMPLIED">

<!ELEMENT HTML O O (HEAD, BODY)>
<!ELEMENT HEAD O O (TITLE & BASE?) +(SCRIPT|STYLE|META|LINK|OBJECT|NOSCRIPT)>
<!ELEMENT TITLE - - RCDATA -- document title -->
<!ELEMENT (BASE|META|LINK) - O EMPTY>
<!ELEMENT (SCRIPT|STYLE) - - CDATA>
<!ELEMENT BODY O O (%flow;)* +(INS|DEL)>

<!ELEMENT (%fontstyle;|%phrase;) - - (%inline;)*>
<!ELEMENT (SUB|SUP|SPAN|BDO|Q|FONT|LABEL|LEGEND|CAPTION) - - (%inline;)*>
<!ELEMENT A - - (%inline;)* -(A)>
<!ELEMENT (BR|WBR|BASEFONT|IMG|EMBED|SOURCE|TRACK|HR|INPUT|PARAM|AREA|COL|ISINDEX) - O EMPTY>
<!ELEMENT (OBJECT|APPLET) - - (PARAM | %flow;)*>
<!ELEMENT (VIDEO|AUDIO|CANVAS|PICTURE) - - (SOURCE | TRACK | %flow;)*>
<!ELEMENT MAP - - (%block; | AREA)+>
<!ELEMENT (IFRAME|NOSCRIPT|NOFRAMES|DIV|CENTER|BLOCKQUOTE|INS|DEL|%sectioning;) - - (%flow;)*>
<!ELEMENT P - O (%inline;)*>
<!ELEMENT (%heading;) - - (%inline;)*>
<!ELEMENT PRE - - (%inline;)* -(IMG|OBJECT|APPLET|BIG|SMALL|SUB|SUP|FONT|BASEFONT)>
<!ELEMENT ADDRESS - - (%inline;|P)*>
<!ELEMENT (%list;) - - (LI)+>
<!ELEMENT LI - O (%flow;)*>
<!ELEMENT DL - - (DT|DD)+>
<!ELEMENT DT - O (%inline;)*>
<!ELEMENT DD - O (%flow;)*>

<!ELEMENT FORM - - (%flow;)* -(FORM)>
<!ELEMENT FIELDSET - - (LEGEND | %flow;)*>
<!ELEMENT SELECT - - (OPTGROUP|OPTION)+>
<!ELEMENT OPTGROUP - - (OPTION)+>
<!ELEMENT OPTION - O (#PCDATA)>
<!ELEMENT TEXTAREA - - RCDATA>
<!ELEMENT BUTTON - - (%flow;)* -(A|%formctrl;|FORM|FIELDSET|IFRAME)>

<!ELEMENT TABLE - - (CAPTION?, (COL*|COLGROUP*), THEAD?, TFOOT?, TBODY+)>
<!ELEMENT COLGROUP - O (COL)*>
<!ELEMENT (THEAD|TFOOT) - O (TR)+>
<!ELEMENT TBODY O O (TR)+>
<!ELEMENT TR - O (TH|TD)+>
<!ELEMENT (TH|TD) - O (%flow;)*>

<!ATTLIST (%fontstyle;|%phrase;|SUB|SUP|SPAN|BDO|Q|FONT|LABEL|LEGEND|CAPTION|A|P|%heading;|PRE|ADDRESS|DIV|
           CENTER|BLOCKQUOTE|INS|DEL|%sectioning;|BODY|IFRAME|OBJECT|VIDEO|AUDIO|CANVAS|PICTURE|MAP|LI|DL|DT|DD|
           FORM|FIELDSET|BUTTON|SELECT|OPTGROUP|TEXTAREA|TABLE|THEAD|TFOOT|TBODY|TR|COLGROUP|COL|IMG|EMBED|HR|BR)
   %coreattrs;>
<!ATTLIST (%list;|DL) compact (compact) #IMPLIED>
<!ATTLIST (TH|TD)
   %coreattrs;
   nowrap (nowrap) #IMPLIED -- suppress word wrap --
   rowspan NUMBER 1
   colspan NUMBER 1>
<!ATTLIST INPUT
   %coreattrs;
   checked (checked) #IMPLIED
   disabled (disabled) #IMPLIED
   readonly (readonly) #IMPLIED>
<!ATTLIST OPTION
   selected (selected) #IMPLIED
   disabled (disabled) #IMPLIED>
<!ATTLIST SELECT multiple (multiple) #IMPLIED>
<!ATTLIST HR noshade (noshade) #IMPLIED>
<!ATTLIST IMG ismap (ismap) #IMPLIED>
<!ATTLIST SCRIPT defer (defer) #IMPLIED>
<!ATTLIST AREA nohref (nohref) #IMPLIED>
<!ATTLIST OBJECT declare (declare) #IMPLIED>
"##;

static HTML_DTD: LazyLock<Result<SgmlDtd, SgmlError>> = LazyLock::new(|| {
    let dtd = DtdParser::parse("HTML", &html_dtd_text());
    if let Ok(dtd) = &dtd {
        debug!(elements = dtd.element_count(), entities = dtd.entity_count(), "loaded built-in HTML DTD");
    }
    dtd
});

/// Entity declarations followed by the element grammar.
pub fn html_dtd_text() -> String {
    let mut text = String::with_capacity(16 * 1024);
    let latin1 = LATIN1_ENTITIES.iter().zip(160u32..);
    for (name, code) in latin1.chain(NAMED_ENTITIES.iter().map(|(n, c)| (n, *c))) {
        let _ = writeln!(text, "<!ENTITY {name} CDATA \"&#{code};\">");
    }
    text.push_str(ELEMENT_DECLARATIONS);
    text
}

/// The shared HTML DTD.
pub fn html_dtd() -> Result<&'static SgmlDtd, SgmlError> {
    HTML_DTD.as_ref().map_err(Clone::clone)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sgml::dtd::DeclaredContent;

    #[test]
    fn test_builtin_dtd_parses() {
        let dtd = html_dtd().unwrap();
        assert_eq!(dtd.entity_count(), 253);
        for name in ["html", "body", "p", "table", "tbody", "section", "figcaption", "video", "option"] {
            assert!(dtd.find_element(name).is_some(), "missing element {name}");
        }
    }

    #[test]
    fn test_entities_are_case_sensitive() {
        let dtd = html_dtd().unwrap();
        assert_eq!(dtd.find_entity("Agrave").unwrap().literal.as_deref(), Some("\u{C0}"));
        assert_eq!(dtd.find_entity("agrave").unwrap().literal.as_deref(), Some("\u{E0}"));
        assert_eq!(dtd.find_entity("amp").unwrap().literal.as_deref(), Some("&"));
        assert_eq!(dtd.find_entity("euro").unwrap().literal.as_deref(), Some("\u{20AC}"));
    }

    #[test]
    fn test_declared_content_types() {
        let dtd = html_dtd().unwrap();
        assert_eq!(dtd.find_element("script").unwrap().declared_content(), DeclaredContent::Cdata);
        assert_eq!(dtd.find_element("style").unwrap().declared_content(), DeclaredContent::Cdata);
        assert_eq!(dtd.find_element("title").unwrap().declared_content(), DeclaredContent::Rcdata);
        assert_eq!(dtd.find_element("textarea").unwrap().declared_content(), DeclaredContent::Rcdata);
        for empty in ["br", "img", "hr", "meta", "link", "input", "col", "embed"] {
            assert!(dtd.find_element(empty).unwrap().is_empty(), "{empty} should be EMPTY");
        }
    }

    #[test]
    fn test_declarations_parse_through_to_the_last_attlist() {
        let dtd = html_dtd().unwrap();
        let inline = dtd.find_parameter_entity("inline").unwrap();
        assert!(inline.literal.as_deref().is_some_and(|text| text.starts_with("#PCDATA")));
        let p = dtd.find_element("p").unwrap();
        for child in ["b", "mark", "nobr", "#pcdata"] {
            assert!(p.can_contain(child, dtd), "p should contain {child}");
        }
        assert!(dtd.find_element("object").unwrap().find_attribute("declare").is_some());
    }

    #[test]
    fn test_optional_tags() {
        let dtd = html_dtd().unwrap();
        let body = dtd.find_element("body").unwrap();
        assert!(body.start_tag_optional && body.end_tag_optional);
        assert!(dtd.find_element("tbody").unwrap().start_tag_optional);
        assert!(dtd.find_element("p").unwrap().end_tag_optional);
        assert!(!dtd.find_element("div").unwrap().end_tag_optional);
    }

    #[test]
    fn test_containment() {
        let dtd = html_dtd().unwrap();
        let html = dtd.find_element("html").unwrap();
        assert!(html.can_contain("p", dtd));
        assert!(html.can_contain("title", dtd));
        let p = dtd.find_element("p").unwrap();
        assert!(p.can_contain("a", dtd));
        assert!(p.can_contain("#pcdata", dtd));
        assert!(!p.can_contain("div", dtd));
        assert!(!dtd.find_element("a").unwrap().can_contain("a", dtd));
        assert!(dtd.find_element("table").unwrap().can_contain("tr", dtd));
    }

    #[test]
    fn test_minimized_attribute_definitions() {
        let dtd = html_dtd().unwrap();
        let td = dtd.find_element("td").unwrap();
        assert!(td.find_attribute("nowrap").unwrap().allows_value("nowrap"));
        assert!(td.find_attribute("id").is_some());
        assert!(dtd.find_element("option").unwrap().find_attribute("selected").is_some());
    }
}
