//! Pattern rules.
//!
//! Each rule is a linear-time `regex` with bounded quantifiers. Labelled rules
//! capture only the value after the label (`value` group); address and e-mail
//! rules also capture a `region` group that partial-reveal masking keeps.
//! Horizontal whitespace is spelled `[ \t\u{3000}]` so no rule can match across
//! a line break.

use super::Category;
use lazy_static::lazy_static;
use regex::Regex;

/// A single detection rule.
pub struct PatternRule {
    /// Stable rule identifier reported on spans
    pub id: &'static str,
    /// Category assigned to matches
    pub category: Category,
    /// Compiled pattern
    pub regex: &'static Regex,
    /// Confidence reported on matches
    pub confidence: f32,
    /// Extra check on the matched value
    pub validate: Option<fn(&str) -> bool>,
}

lazy_static! {
    // Names: label followed by the value
    static ref NAME_JA: Regex = Regex::new(
        r"(?:氏[ \t\u{3000}]?名|お名前|名前|フリガナ|ふりがな)[ \t\u{3000}]*[:：]?[ \t\u{3000}]*(?P<value>[\p{Han}\p{Hiragana}\p{Katakana}ー々]{1,10}(?:[ \t\u{3000}]+[\p{Han}\p{Hiragana}\p{Katakana}ー々]{1,10})?)"
    ).unwrap();

    static ref NAME_EN: Regex = Regex::new(
        r"\b(?i:full[ \t]*name|name|candidate)[ \t]*[:：][ \t]*(?P<value>\p{Lu}[\p{L}'\-]{0,30}(?:[ \t]+\p{Lu}\.?[\p{L}'\-]{0,30}){0,3})"
    ).unwrap();

    // Addresses: prefecture (or labelled free text) plus the rest of the line
    static ref ADDRESS_JA_LABELLED: Regex = Regex::new(
        r"(?:現住所|住[ \t\u{3000}]?所|所在地)[ \t\u{3000}]*[:：]?[ \t\u{3000}]*(?:〒?[ \t]*\d{3}[-－]\d{4}[ \t\u{3000}]*)?(?P<value>(?P<region>東京都|北海道|(?:京都|大阪)府|\p{Han}{2,3}県)[^\n]{1,60})"
    ).unwrap();

    static ref ADDRESS_JA: Regex = Regex::new(
        r"(?P<value>(?P<region>東京都|北海道|(?:京都|大阪)府|\p{Han}{2,3}県)\p{Han}{1,6}?[市区町村郡][^\s,、。「」()（）]{1,40})"
    ).unwrap();

    static ref ADDRESS_EN: Regex = Regex::new(
        r"\b(?i:home[ \t]+address|address|residence)[ \t]*[:：][ \t]*(?P<value>[^\n]{3,100})"
    ).unwrap();

    static ref POSTAL_JA: Regex = Regex::new(
        r"(?P<value>〒[ \t]*\d{3}[-－]\d{4})"
    ).unwrap();

    static ref POSTAL_LABELLED: Regex = Regex::new(
        r"\b(?i:zip(?:[ \t]*code)?|postal[ \t]*code|postcode)[ \t]*[:：]?[ \t]*(?P<value>\d{3}-\d{4}|\d{5}(?:-\d{4})?)\b"
    ).unwrap();

    static ref PHONE_JA: Regex = Regex::new(
        r"\b0\d{1,4}[-－(（]\d{1,4}[-－)）]\d{3,4}\b|\b0[5789]0\d{8}\b"
    ).unwrap();

    static ref PHONE_INTL: Regex = Regex::new(
        r"\+\d{1,3}[ .\-]?\(?\d{1,4}\)?[ .\-]?\d{1,4}[ .\-]?\d{3,4}\b"
    ).unwrap();

    static ref PHONE_NANP: Regex = Regex::new(
        r"\(\d{3}\)[ .\-]?\d{3}[ .\-]\d{4}\b|\b\d{3}[.\-]\d{3}[.\-]\d{4}\b"
    ).unwrap();

    static ref EMAIL: Regex = Regex::new(
        r"(?i)\b[A-Z0-9._%+\-]{1,64}(?P<region>@[A-Z0-9.\-]{1,253}\.[A-Z]{2,24})\b"
    ).unwrap();

    static ref DOB_LABELLED: Regex = Regex::new(
        r"(?:生年月日|誕生日|\b(?i:date[ \t]+of[ \t]+birth|birth[ \t]*date|d\.?o\.?b\.?|born))[ \t\u{3000}]*[:：]?[ \t\u{3000}]*(?P<value>(?:(?:昭和|平成|令和)\d{1,2}年\d{1,2}月\d{1,2}日|\d{4}[年/.\-]\d{1,2}[月/.\-]\d{1,2}日?|\d{1,2}/\d{1,2}/\d{4}|(?i:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]{0,6}\.?[ \t]+\d{1,2},?[ \t]+\d{4}|\d{1,2}[ \t]+(?i:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]{0,6}\.?[ \t]+\d{4})(?:生まれ|生)?(?:[ \t\u{3000}]*[（(]満?\d{1,3}歳[)）])?)"
    ).unwrap();

    static ref ID_LABELLED: Regex = Regex::new(
        r"(?:マイナンバー|個人番号|運転免許証番号|免許証番号|パスポート番号|旅券番号|社員番号|\b(?i:passport(?:[ \t]+(?:no\.?|number))?|driver'?s?[ \t]+licen[cs]e(?:[ \t]+(?:no\.?|number))?|social[ \t]+security[ \t]+number|ssn|employee[ \t]+id|id[ \t]+number))[ \t\u{3000}]*[:：#]?[ \t\u{3000}]*(?P<value>[A-Z0-9][A-Z0-9\- ]{3,22}[A-Z0-9])"
    ).unwrap();

    static ref SSN: Regex = Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap();

    static ref MY_NUMBER: Regex = Regex::new(r"\b\d{4}[ \-]\d{4}[ \-]\d{4}\b").unwrap();

    static ref URL: Regex = Regex::new(
        r#"(?i)\b(?:https?://|www\.)[^\s<>"'）」]{0,512}[^\s<>"'.,;:!?）)」]"#
    ).unwrap();

    static ref ORG_JA: Regex = Regex::new(
        r"(?:株式会社|有限会社|合同会社)[\p{Han}\p{Katakana}ー・A-Za-z0-9＆&]{1,30}|[\p{Han}\p{Katakana}ー・A-Za-z--[年月日卒入在]]{1,30}(?:株式会社|有限会社|合同会社|大学院|大学|高等学校|高校|専門学校)"
    ).unwrap();

    static ref ORG_EN: Regex = Regex::new(
        r"\b(?:\p{Lu}[\p{L}&\-]{0,30}[ \t]+){1,4}(?:Inc\.?|LLC|Ltd\.?|Corporation|Corp\.?|Co\.,[ \t]*Ltd\.?|University|College|GmbH|K\.K\.)"
    ).unwrap();

    /// Built-in rules, grouped by category.
    pub static ref RULES: Vec<PatternRule> = vec![
        PatternRule { id: "name.ja.labelled", category: Category::Name, regex: &NAME_JA, confidence: 0.9, validate: None },
        PatternRule { id: "name.en.labelled", category: Category::Name, regex: &NAME_EN, confidence: 0.85, validate: None },
        PatternRule { id: "address.ja.labelled", category: Category::Address, regex: &ADDRESS_JA_LABELLED, confidence: 0.9, validate: None },
        PatternRule { id: "address.ja", category: Category::Address, regex: &ADDRESS_JA, confidence: 0.75, validate: None },
        PatternRule { id: "address.en.labelled", category: Category::Address, regex: &ADDRESS_EN, confidence: 0.8, validate: None },
        PatternRule { id: "postal.ja", category: Category::PostalCode, regex: &POSTAL_JA, confidence: 0.95, validate: None },
        PatternRule { id: "postal.labelled", category: Category::PostalCode, regex: &POSTAL_LABELLED, confidence: 0.85, validate: None },
        PatternRule { id: "phone.ja", category: Category::Phone, regex: &PHONE_JA, confidence: 0.85, validate: Some(plausible_phone) },
        PatternRule { id: "phone.intl", category: Category::Phone, regex: &PHONE_INTL, confidence: 0.8, validate: Some(plausible_phone) },
        PatternRule { id: "phone.nanp", category: Category::Phone, regex: &PHONE_NANP, confidence: 0.75, validate: Some(plausible_phone) },
        PatternRule { id: "email", category: Category::Email, regex: &EMAIL, confidence: 0.95, validate: None },
        PatternRule { id: "dob.labelled", category: Category::DateOfBirth, regex: &DOB_LABELLED, confidence: 0.9, validate: None },
        PatternRule { id: "id.labelled", category: Category::IdNumber, regex: &ID_LABELLED, confidence: 0.85, validate: None },
        PatternRule { id: "id.ssn", category: Category::IdNumber, regex: &SSN, confidence: 0.7, validate: None },
        PatternRule { id: "id.my-number", category: Category::IdNumber, regex: &MY_NUMBER, confidence: 0.6, validate: None },
        PatternRule { id: "url", category: Category::Url, regex: &URL, confidence: 0.9, validate: None },
        PatternRule { id: "org.ja", category: Category::Organization, regex: &ORG_JA, confidence: 0.7, validate: None },
        PatternRule { id: "org.en", category: Category::Organization, regex: &ORG_EN, confidence: 0.65, validate: None },
    ];
}

/// Phone numbers carry 10 to 15 digits.
fn plausible_phone(value: &str) -> bool {
    let digits = value.chars().filter(|c| c.is_ascii_digit()).count();
    (10..=15).contains(&digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
        re.captures(text)
            .map(|c| c.name("value").or_else(|| c.get(0)).map(|m| m.as_str()).unwrap_or(""))
    }

    #[test]
    fn test_all_rules_compile() {
        assert!(RULES.len() >= Category::ALL.len() - 1);
        for rule in RULES.iter() {
            assert!(!rule.id.is_empty());
        }
    }

    #[test]
    fn test_name_rules() {
        assert_eq!(value(&NAME_JA, "氏名：山田 太郎"), Some("山田 太郎"));
        assert_eq!(value(&NAME_EN, "Name: Taro Yamada"), Some("Taro Yamada"));
        assert_eq!(value(&NAME_EN, "Name:\nTaro"), None);
    }

    #[test]
    fn test_address_rules() {
        let caps = ADDRESS_JA_LABELLED.captures("住所：〒100-0001 東京都千代田区千代田1-1").unwrap();
        assert_eq!(&caps["value"], "東京都千代田区千代田1-1");
        assert_eq!(&caps["region"], "東京都");
        let caps = ADDRESS_JA.captures("大阪府大阪市北区梅田3-1").unwrap();
        assert_eq!(&caps["region"], "大阪府");
        assert_eq!(value(&ADDRESS_EN, "Address: 12 Baker Street, London"), Some("12 Baker Street, London"));
    }

    #[test]
    fn test_phone_rules() {
        assert!(PHONE_JA.is_match("TEL 03-1234-5678"));
        assert!(PHONE_JA.is_match("携帯 09012345678"));
        assert!(PHONE_INTL.is_match("+81 90 1234 5678"));
        assert!(PHONE_NANP.is_match("(555) 123-4567"));
        assert!(!plausible_phone("03-12-34"));
    }

    #[test]
    fn test_email_region() {
        let caps = EMAIL.captures("mail: taro.yamada@example.co.jp").unwrap();
        assert_eq!(&caps[0], "taro.yamada@example.co.jp");
        assert_eq!(&caps["region"], "@example.co.jp");
    }

    #[test]
    fn test_dob_rules() {
        assert_eq!(value(&DOB_LABELLED, "生年月日：1990年4月1日生（満34歳）"), Some("1990年4月1日生（満34歳）"));
        assert_eq!(value(&DOB_LABELLED, "Date of birth: April 1, 1990"), Some("April 1, 1990"));
        assert_eq!(value(&DOB_LABELLED, "DOB: 01/04/1990"), Some("01/04/1990"));
    }

    #[test]
    fn test_url_trailing_punctuation() {
        let m = URL.find("See https://example.com/me.").unwrap();
        assert_eq!(m.as_str(), "https://example.com/me");
    }

    #[test]
    fn test_org_rules() {
        assert_eq!(ORG_JA.find("2015年東京大学卒業").map(|m| m.as_str()), Some("東京大学"));
        assert!(ORG_JA.is_match("株式会社サンプル"));
        assert_eq!(ORG_EN.find("worked at Acme Widgets Inc. as").map(|m| m.as_str()), Some("Acme Widgets Inc."));
    }

    #[test]
    fn test_id_rules() {
        assert_eq!(value(&ID_LABELLED, "Passport No. TK1234567"), Some("TK1234567"));
        assert!(SSN.is_match("123-45-6789"));
    }
}
