//! 分隔符判定
//!
//! 分段器和关键词编解码共用的纯函数：判断一个字符是否构成词边界。
//! 字符串首尾视为边界。

/// 多语言标点集合（拉丁 + CJK 全角）
const PUNCTUATION: &[char] = &[
    // 拉丁
    '!', '"', '#', '$', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/', ':', ';', '<',
    '=', '>', '?', '@', '[', '\\', ']', '^', '_', '`', '{', '|', '}', '~', '«', '»',
    // 破折号与省略
    '–', '—', '…',
    // CJK
    '，', '。', '！', '？', '；', '：', '、', '“', '”', '‘', '’', '（', '）', '【', '】', '《',
    '》', '〈', '〉', '「', '」', '『', '』', '〔', '〕', '～', '·', '．', '＃',
];

/// 判断单个字符是否为词边界（空白或标点）
pub fn is_boundary_char(ch: char) -> bool {
    ch.is_whitespace() || PUNCTUATION.contains(&ch)
}

/// 判断可选字符是否为词边界；`None` 表示字符串首尾，恒为边界
pub fn is_boundary(ch: Option<char>) -> bool {
    match ch {
        None => true,
        Some(c) => is_boundary_char(c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_edges_are_boundaries() {
        assert!(is_boundary(None));
    }

    #[test]
    fn test_whitespace_is_boundary() {
        assert!(is_boundary(Some(' ')));
        assert!(is_boundary(Some('\n')));
        assert!(is_boundary(Some('\t')));
        assert!(is_boundary(Some('\u{3000}'))); // 全角空格
    }

    #[test]
    fn test_latin_punctuation_is_boundary() {
        for c in [',', '.', '!', '?', '(', ')', '"', '\''] {
            assert!(is_boundary(Some(c)), "{:?} 应为边界", c);
        }
    }

    #[test]
    fn test_cjk_punctuation_is_boundary() {
        for c in ['，', '。', '！', '？', '、', '《', '》', '「', '」'] {
            assert!(is_boundary(Some(c)), "{:?} 应为边界", c);
        }
    }

    #[test]
    fn test_word_characters_are_not_boundaries() {
        for c in ['a', 'Z', '0', '9', '中', 'あ', 'ü'] {
            assert!(!is_boundary(Some(c)), "{:?} 不应为边界", c);
        }
    }
}
