//! 通用工具函数

use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// CPF 数字位数
pub const CPF_DIGITS: usize = 11;

/// 格式化后 CPF 的最大长度 (`000.000.000-00`)
pub const CPF_FORMATTED_LEN: usize = 14;

const MONTHS_PT: [&str; 12] = [
    "janeiro", "fevereiro", "março", "abril", "maio", "junho",
    "julho", "agosto", "setembro", "outubro", "novembro", "dezembro",
];

/// 去除所有非数字字符
pub fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// 按输入进度套用 CPF 掩码，超出 11 位的数字被截断
pub fn format_cpf(value: &str) -> String {
    let digits: String = digits_only(value).chars().take(CPF_DIGITS).collect();
    let len = digits.len();

    match len {
        0..=3 => digits,
        4..=6 => format!("{}.{}", &digits[..3], &digits[3..]),
        7..=9 => format!("{}.{}.{}", &digits[..3], &digits[3..6], &digits[6..]),
        _ => format!(
            "{}.{}.{}-{}",
            &digits[..3],
            &digits[3..6],
            &digits[6..9],
            &digits[9..]
        ),
    }
}

/// 去格式后至少包含 `min_digits` 位数字才允许查询
pub fn is_searchable(value: &str, min_digits: usize) -> bool {
    digits_only(value).len() >= min_digits
}

/// 取查询键的前 `prefix_digits` 位有效数字
pub fn search_prefix(value: &str, prefix_digits: usize) -> String {
    digits_only(value).chars().take(prefix_digits).collect()
}

/// `15 de janeiro de 2024`
pub fn format_long_date_pt(date: &DateTime<Utc>) -> String {
    let month = MONTHS_PT[date.month0() as usize];
    format!("{:02} de {} de {}", date.day(), month, date.year())
}

/// `01/02/1980`
pub fn format_short_date_pt(date: &NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// 可选字段为空时返回占位文本
pub fn or_placeholder<'a>(value: Option<&'a str>, placeholder: &'a str) -> &'a str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => placeholder,
    }
}
