//! Server-rendered pages.

use crate::flash::Message;
use crate::forms::{FieldErrors, LoginForm, RegistrationForm};
use crate::stock::StockRecord;
use std::borrow::Cow;
use std::fmt::Write;

const COLUMN_TITLES: [&str; 10] = [
    "Business Date",
    "Symbol",
    "Open",
    "High",
    "Low",
    "Close",
    "Previous Close",
    "Total Trades",
    "Average Traded Price",
    "Market Capitalization",
];

pub fn escape(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}

fn layout(title: &str, message: Option<&Message>, body: &str) -> String {
    let flash = message
        .map(|m| {
            format!(
                "<div class=\"alert alert-{}\">{}</div>\n",
                m.category.as_str(),
                escape(m.text)
            )
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
</head>
<body>
<nav><a href="/">Home</a> | <a href="/register">Register</a> | <a href="/login">Login</a></nav>
<main>
{flash}{body}
</main>
</body>
</html>
"#,
        title = escape(title),
        flash = flash,
        body = body,
    )
}

pub fn home_page(records: &[StockRecord], fetched_at: &str, message: Option<&Message>) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "<h1>Today's Share Price</h1>");
    let _ = writeln!(body, "<p class=\"fetched-at\">As of {}</p>", escape(fetched_at));

    body.push_str("<table class=\"stock-table\">\n<thead><tr>");
    for title in COLUMN_TITLES {
        let _ = write!(body, "<th>{}</th>", title);
    }
    body.push_str("</tr></thead>\n<tbody>\n");
    for record in records {
        body.push_str("<tr>");
        for value in record.values() {
            let _ = write!(body, "<td>{}</td>", escape(value));
        }
        body.push_str("</tr>\n");
    }
    body.push_str("</tbody>\n</table>\n");
    if records.is_empty() {
        body.push_str("<p>No trades listed.</p>\n");
    }
    body.push_str("<p><a href=\"/today-price.csv\">Download CSV</a></p>\n");

    layout("Today's Share Price", message, &body)
}

pub fn error_page(message: &str) -> String {
    let body = format!("<h1>Error</h1>\n<p class=\"error\">{}</p>\n", escape(message));
    layout("Error", None, &body)
}

fn field_errors(errors: &FieldErrors, field: &str) -> String {
    errors
        .get(field)
        .iter()
        .map(|e| format!("<span class=\"field-error\">{}</span>", escape(e)))
        .collect()
}

fn credentials_form(action: &str, submit: &str, username: &str, errors: &FieldErrors) -> String {
    format!(
        r#"<form method="post" action="{action}">
<p><label for="username">Username</label>
<input id="username" name="username" type="text" value="{username}" required minlength="2" maxlength="20">
{username_errors}</p>
<p><label for="password">Password</label>
<input id="password" name="password" type="password" required>
{password_errors}</p>
<p><input type="submit" value="{submit}"></p>
</form>
"#,
        action = action,
        username = escape(username),
        username_errors = field_errors(errors, "username"),
        password_errors = field_errors(errors, "password"),
        submit = submit,
    )
}

pub fn register_page(form: &RegistrationForm, errors: &FieldErrors, message: Option<&Message>) -> String {
    let body = format!(
        "<h1>Register</h1>\n{}",
        credentials_form("/register", "Sign Up", &form.username, errors)
    );
    layout("Register", message, &body)
}

pub fn login_page(form: &LoginForm, errors: &FieldErrors, message: Option<&Message>) -> String {
    let body = format!(
        "<h1>Login</h1>\n{}",
        credentials_form("/login", "Login", &form.username, errors)
    );
    layout("Login", message, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash::Flash;

    fn record(symbol: &str) -> StockRecord {
        StockRecord {
            business_date: "2024-06-02".into(),
            symbol: symbol.into(),
            open_price: "1,000.00".into(),
            high_price: "1,010.00".into(),
            low_price: "990.00".into(),
            close_price: "1,005.00".into(),
            previous_day_close_price: "998.00".into(),
            total_trades: "1,234".into(),
            average_traded_price: "1,001.50".into(),
            market_capitalization: "1,234,567".into(),
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("NABIL"), "NABIL");
        assert_eq!(escape("<b>\"A&B\"</b>"), "&lt;b&gt;&quot;A&amp;B&quot;&lt;/b&gt;");
    }

    #[test]
    fn test_home_page_lists_records_in_order() {
        let html = home_page(&[record("NABIL"), record("ADBL")], "2024-06-02 15:00 +0545", None);
        let nabil = html.find("<td>NABIL</td>").unwrap();
        let adbl = html.find("<td>ADBL</td>").unwrap();
        assert!(nabil < adbl);
        assert!(html.contains("<td>1,234,567</td>"));
        assert!(html.contains("Market Capitalization"));
        assert!(!html.contains("No trades listed."));
    }

    #[test]
    fn test_home_page_escapes_scraped_text() {
        let html = home_page(&[record("<script>")], "now", None);
        assert!(html.contains("<td>&lt;script&gt;</td>"));
    }

    #[test]
    fn test_flash_rendered_with_category() {
        let message = Flash::AccountCreated.message();
        let html = login_page(&LoginForm::default(), &FieldErrors::default(), Some(&message));
        assert!(html.contains("alert-success"));
        assert!(html.contains("Your account has been created!"));
    }

    #[test]
    fn test_register_page_shows_errors_and_keeps_username() {
        let mut errors = FieldErrors::default();
        errors.add("username", "Field must be between 2 and 20 characters long.");
        let form = RegistrationForm {
            username: "a".into(),
            password: "hunter2".into(),
        };
        let html = register_page(&form, &errors, None);
        assert!(html.contains("value=\"a\""));
        assert!(html.contains("Field must be between 2 and 20 characters long."));
        assert!(!html.contains("hunter2"));
    }

    #[test]
    fn test_error_page() {
        let html = error_page("Failed to retrieve stock data");
        assert!(html.contains("Failed to retrieve stock data"));
        assert!(!html.contains("<table"));
    }
}
