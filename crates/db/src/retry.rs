//! Wiederholung transienter Verbindungsfehler beim Start

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Wartezeit vor dem n-ten Wiederholungsversuch (linear)
const BASIS_WARTEZEIT: Duration = Duration::from_millis(500);

/// Fuehrt `op` bis zu `versuche` mal aus und liefert das erste Ergebnis
/// ohne Fehler, sonst den letzten Fehler.
pub async fn mit_wiederholung<T, E, F, Fut>(
    versuche: u32,
    beschreibung: &str,
    mut op: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let versuche = versuche.max(1);
    let mut versuch = 1;
    loop {
        match op().await {
            Ok(wert) => return Ok(wert),
            Err(e) if versuch < versuche => {
                let warten = BASIS_WARTEZEIT * versuch;
                warn!(
                    versuch,
                    max = versuche,
                    warten_ms = warten.as_millis() as u64,
                    fehler = %e,
                    "{beschreibung} fehlgeschlagen, neuer Versuch"
                );
                tokio::time::sleep(warten).await;
                versuch += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn erfolg_nach_transientem_fehler() {
        let zaehler = AtomicU32::new(0);
        let z = &zaehler;
        let ergebnis: Result<u32, String> = mit_wiederholung(3, "Test", move || async move {
            let n = z.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(format!("Versuch {n} fehlgeschlagen"))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(ergebnis, Ok(3));
        assert_eq!(zaehler.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn letzter_fehler_nach_erschoepfung() {
        let zaehler = AtomicU32::new(0);
        let z = &zaehler;
        let ergebnis: Result<(), String> = mit_wiederholung(3, "Test", move || async move {
            z.fetch_add(1, Ordering::SeqCst);
            Err("nicht erreichbar".to_string())
        })
        .await;

        assert_eq!(ergebnis, Err("nicht erreichbar".to_string()));
        assert_eq!(zaehler.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn null_versuche_bedeutet_einmal() {
        let zaehler = AtomicU32::new(0);
        let z = &zaehler;
        let _: Result<(), String> = mit_wiederholung(0, "Test", move || async move {
            z.fetch_add(1, Ordering::SeqCst);
            Err("x".to_string())
        })
        .await;
        assert_eq!(zaehler.load(Ordering::SeqCst), 1);
    }
}
