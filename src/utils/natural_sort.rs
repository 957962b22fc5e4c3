//! 自然排序：把文件名中的连续数字当作整数比较，使 `slide-2` 排在 `slide-10` 之前

use std::cmp::Ordering;

/// 比较两个字符串，忽略大小写，数字段按数值比较
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let lhs = take_number(&mut left);
                let rhs = take_number(&mut right);
                let ord = compare_digits(&lhs, &rhs);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                let ord = x.to_lowercase().cmp(y.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    digits
}

/// 按数值比较两个数字串，不做整数转换以免溢出
fn compare_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_segments_sort_by_value() {
        let mut names = vec!["slide-10.html", "slide-2.html", "slide-1.html"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["slide-1.html", "slide-2.html", "slide-10.html"]);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(natural_cmp("Intro.html", "intro2.html"), Ordering::Less);
        assert_eq!(natural_cmp("B.html", "a.html"), Ordering::Greater);
    }

    #[test]
    fn test_leading_zeros_and_directories() {
        assert_ne!(natural_cmp("s/007.html", "s/7.html"), Ordering::Equal);
        assert_eq!(natural_cmp("part2/slide-1.html", "part10/slide-1.html"), Ordering::Less);
    }
}
