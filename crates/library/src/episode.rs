/// Episode number embedded in a track title: the first run of ASCII digits
/// (at most four), else the first run of Chinese numerals, else 0.
pub fn episode_number(title: &str) -> u32 {
    if let Some(number) = leading_ascii_number(title) {
        return number;
    }
    let numerals: String = title
        .chars()
        .skip_while(|ch| chinese_value(*ch).is_none())
        .take_while(|ch| chinese_value(*ch).is_some())
        .collect();
    if numerals.is_empty() {
        0
    } else {
        chinese_to_number(&numerals)
    }
}

fn leading_ascii_number(title: &str) -> Option<u32> {
    let digits: String = title
        .chars()
        .skip_while(|ch| !ch.is_ascii_digit())
        .take_while(|ch| ch.is_ascii_digit())
        .take(4)
        .collect();
    digits.parse().ok()
}

fn chinese_value(ch: char) -> Option<u32> {
    let value = match ch {
        '零' | '〇' => 0,
        '一' => 1,
        '二' | '两' => 2,
        '三' => 3,
        '四' => 4,
        '五' => 5,
        '六' => 6,
        '七' => 7,
        '八' => 8,
        '九' => 9,
        '十' => 10,
        '百' => 100,
        '千' => 1000,
        '万' => 10000,
        _ => return None,
    };
    Some(value)
}

fn chinese_to_number(numerals: &str) -> u32 {
    let mut total: u32 = 0;
    let mut section: u32 = 0;
    let mut digit: u32 = 0;
    for ch in numerals.chars() {
        let value = match chinese_value(ch) {
            Some(value) => value,
            None => continue,
        };
        match value {
            0..=9 => digit = value,
            10000 => {
                section = section.saturating_add(digit).saturating_mul(value);
                total = total.saturating_add(section);
                section = 0;
                digit = 0;
            }
            unit => {
                // A bare unit such as 十 counts as one of it.
                let count = if digit == 0 { 1 } else { digit };
                section = section.saturating_add(count.saturating_mul(unit));
                digit = 0;
            }
        }
    }
    total.saturating_add(section).saturating_add(digit)
}
