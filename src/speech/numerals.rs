//! Spanish number-to-words conversion for spoken output.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Masculine,
    Feminine,
}

fn units(n: u64, gender: Gender) -> &'static str {
    match (n, gender) {
        (1, Gender::Masculine) => "uno",
        (1, Gender::Feminine) => "una",
        (2, _) => "dos",
        (3, _) => "tres",
        (4, _) => "cuatro",
        (5, _) => "cinco",
        (6, _) => "seis",
        (7, _) => "siete",
        (8, _) => "ocho",
        (9, _) => "nueve",
        _ => "",
    }
}

fn tens(n: u64, gender: Gender) -> String {
    match n {
        0..=9 => units(n, gender).to_string(),
        10 => "diez".into(),
        11 => "once".into(),
        12 => "doce".into(),
        13 => "trece".into(),
        14 => "catorce".into(),
        15 => "quince".into(),
        16 => "dieciséis".into(),
        17..=19 => format!("dieci{}", units(n - 10, gender)),
        20 => "veinte".into(),
        21 => match gender {
            Gender::Masculine => "veintiuno".into(),
            Gender::Feminine => "veintiuna".into(),
        },
        22 => "veintidós".into(),
        23 => "veintitrés".into(),
        26 => "veintiséis".into(),
        24 | 25 | 27..=29 => format!("veinti{}", units(n - 20, gender)),
        _ => {
            let decade = match n / 10 {
                3 => "treinta",
                4 => "cuarenta",
                5 => "cincuenta",
                6 => "sesenta",
                7 => "setenta",
                8 => "ochenta",
                _ => "noventa",
            };
            if n % 10 == 0 {
                decade.to_string()
            } else {
                format!("{decade} y {}", units(n % 10, gender))
            }
        }
    }
}

fn hundreds(n: u64, gender: Gender) -> String {
    if n == 100 {
        return "cien".into();
    }
    let suffix = match gender {
        Gender::Masculine => "os",
        Gender::Feminine => "as",
    };
    let prefix = match n / 100 {
        0 => return tens(n, gender),
        1 => "ciento".to_string(),
        2 => format!("doscient{suffix}"),
        3 => format!("trescient{suffix}"),
        4 => format!("cuatrocient{suffix}"),
        5 => format!("quinient{suffix}"),
        6 => format!("seiscient{suffix}"),
        7 => format!("setecient{suffix}"),
        8 => format!("ochocient{suffix}"),
        _ => format!("novecient{suffix}"),
    };
    if n % 100 == 0 {
        prefix
    } else {
        format!("{prefix} {}", tens(n % 100, gender))
    }
}

/// Apocopated form used before masculine nouns, "mil" and "millones"
/// ("un servicio", "veintiún mil").
pub fn apocopate(words: String) -> String {
    if let Some(stem) = words.strip_suffix("veintiuno") {
        format!("{stem}veintiún")
    } else if let Some(stem) = words.strip_suffix("uno") {
        format!("{stem}un")
    } else {
        words
    }
}

/// Convert an integer into Spanish words, up to the millions.
///
/// Gender shapes "uno/una" agreement through units, tens and hundreds;
/// "millón/millones" is always masculine.
pub fn cardinal_es(n: u64, gender: Gender) -> String {
    if n == 0 {
        return "cero".into();
    }

    let millions = n / 1_000_000;
    let thousands = (n % 1_000_000) / 1_000;
    let rest = n % 1_000;

    let mut parts: Vec<String> = Vec::new();

    match millions {
        0 => {}
        1 => parts.push("un millón".into()),
        _ => parts.push(format!(
            "{} millones",
            apocopate(hundreds(millions, Gender::Masculine))
        )),
    }

    match thousands {
        0 => {}
        1 => parts.push("mil".into()),
        _ => parts.push(format!("{} mil", apocopate(hundreds(thousands, gender)))),
    }

    if rest > 0 {
        parts.push(hundreds(rest, gender));
    }

    parts.join(" ")
}

/// Ordinal lookup for 1–10; empty string beyond that range.
pub fn ordinal_es(n: u64) -> &'static str {
    match n {
        1 => "primer",
        2 => "segundo",
        3 => "tercer",
        4 => "cuarto",
        5 => "quinto",
        6 => "sexto",
        7 => "séptimo",
        8 => "octavo",
        9 => "noveno",
        10 => "décimo",
        _ => "",
    }
}
